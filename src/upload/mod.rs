//! Optional upload of results to a remote endpoint
//!
//! This module handles:
//! - The multipart and JSON-envelope transport strategies
//! - A bounded background queue of uploads
//! - Recording upload outcomes next to the download report

mod client;
mod strategy;

pub use client::{UploadItem, Uploader};
pub use strategy::{
    mime_for, read_response, DestinationMeta, UploadPayload, UploadResponse, UploadStrategy,
};
