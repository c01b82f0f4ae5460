//! Per-job outcome records
//!
//! The report is an append-only sink: each worker writes exactly one row per
//! job it finished, in completion order.

use crate::archive::Placement;
use crate::harvest::Job;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Whether a job (or upload) succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    Ok,
    Fail,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRow {
    pub code: String,
    pub url: String,
    pub status: OutcomeStatus,
    /// HTTP status of the successful response
    pub http_status: Option<u16>,
    pub byte_size: Option<u64>,
    /// Entry name inside the archive, or uploaded file name
    pub final_path: Option<String>,
    pub archive_index: Option<u32>,
    pub error_message: Option<String>,
    /// Reference returned by the upload endpoint
    pub remote_ref: Option<String>,
}

impl OutcomeRow {
    /// A job whose payload landed in an archive
    pub fn success(job: &Job, http_status: u16, byte_size: u64, placement: &Placement) -> Self {
        Self {
            code: job.code.clone(),
            url: job.url.clone(),
            status: OutcomeStatus::Ok,
            http_status: Some(http_status),
            byte_size: Some(byte_size),
            final_path: Some(placement.entry_name.clone()),
            archive_index: Some(placement.archive_index),
            error_message: None,
            remote_ref: None,
        }
    }

    /// A job that failed; the error text is kept, the HTTP status is not
    pub fn failure(job: &Job, error: &dyn fmt::Display) -> Self {
        Self {
            code: job.code.clone(),
            url: job.url.clone(),
            status: OutcomeStatus::Fail,
            http_status: None,
            byte_size: None,
            final_path: None,
            archive_index: None,
            error_message: Some(error.to_string()),
            remote_ref: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }
}

/// Append-only collection of download and upload outcomes
#[derive(Debug, Default)]
pub struct ReportBuilder {
    downloads: Mutex<Vec<OutcomeRow>>,
    uploads: Mutex<Vec<OutcomeRow>>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a download outcome
    pub fn record(&self, row: OutcomeRow) {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    /// Appends an upload outcome
    pub fn record_upload(&self, row: OutcomeRow) {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    /// Every download row, in completion order
    pub fn rows(&self) -> Vec<OutcomeRow> {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn upload_rows(&self) -> Vec<OutcomeRow> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
