//! Configuration module for Image-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Numeric limits are clamped into their safe ranges rather than rejected.
//!
//! # Example
//!
//! ```no_run
//! use image_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Pool size: {}", config.download.pool_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ArchiveConfig, Config, DownloadConfig, HostFilterConfig, ReportConfig, ReportFormat,
    UploadConfig, UploadMode,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::normalize;
