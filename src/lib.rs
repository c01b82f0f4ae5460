//! Image-Harvest: a batch image downloader and archiver
//!
//! This crate turns a list of product records (a code plus remote image links)
//! into size-bounded zip archives, fetching many resources concurrently under
//! per-host limits, retrying transient failures, optionally pushing results to a
//! remote storage endpoint, and producing a per-link outcome report.

pub mod archive;
pub mod config;
pub mod harvest;
pub mod input;
pub mod output;
pub mod state;
pub mod upload;
pub mod url;

use thiserror::Error;

/// Main error type for run-level failures
///
/// Per-link failures never surface here; they are recorded in the report.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Report export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// Errors raised while reading the product sheet
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet is empty")]
    Empty,

    #[error("No products with links found in {rows} rows")]
    NoProducts { rows: usize },
}

/// Errors raised while fetching a single link
///
/// These are per-job conditions: they end up in an outcome row and never
/// abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Unexpected content type: {content_type}")]
    ContentPolicy { content_type: String },

    #[error("Cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt could plausibly change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Timeout | Self::Network(_) | Self::Body(_)
        )
    }
}

/// Errors raised while uploading a single item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Endpoint rejected upload with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Endpoint reported failure: {0}")]
    Remote(String),

    #[error("Upload transport error: {0}")]
    Transport(String),

    #[error("Failed to encode upload: {0}")]
    Encoding(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Multipart upload failed ({primary}); JSON fallback failed ({fallback})")]
    Exhausted { primary: String, fallback: String },
}

impl UploadError {
    /// Server errors and transport failures are worth another attempt with
    /// the same strategy; client-side rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected { status, .. } => *status >= 500,
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

/// Errors raised while packaging or saving archives
///
/// Archive errors are fatal to the whole run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for archive operations
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{build_jobs, Coordinator, Job, RunReport};
pub use input::ProductRecord;
pub use output::{OutcomeRow, OutcomeStatus, ReportBuilder, RunOutcome, RunSummary};
pub use state::{ControlState, HostLimiter, RunControl};
