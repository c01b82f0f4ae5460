use serde::Deserialize;

/// Main configuration structure for Image-Harvest
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub download: DownloadConfig,
    pub hosts: HostFilterConfig,
    pub archive: ArchiveConfig,
    pub report: ReportConfig,
    pub upload: Option<UploadConfig>,
}

/// Download pool and fetch tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of concurrent workers, clamped to [1, 12]
    #[serde(rename = "pool-size")]
    pub pool_size: usize,

    /// Maximum in-flight requests per host, clamped to [1, 8]
    #[serde(rename = "per-host-limit")]
    pub per_host_limit: usize,

    /// Maximum images taken per product code (0 = unlimited)
    #[serde(rename = "max-per-product")]
    pub max_per_product: usize,

    /// Attempts per link before it is recorded as failed
    #[serde(rename = "retry-attempts")]
    pub retry_attempts: u32,

    /// Timeout of a single attempt (milliseconds)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Base of the linear backoff between attempts (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Reject responses whose content type is not an image
    #[serde(rename = "require-image")]
    pub require_image: bool,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            pool_size: 6,
            per_host_limit: 4,
            max_per_product: 0,
            retry_attempts: 3,
            timeout_ms: 15_000,
            backoff_base_ms: 800,
            require_image: true,
            user_agent: format!("image-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Host allow/deny lists, matched as hostname suffixes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostFilterConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Archive layout and rotation thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory the finished archives are written to
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Leading part of every archive name
    pub prefix: String,

    /// Archive file extension (without the dot)
    pub extension: String,

    /// Files per archive before rotating (floor 50)
    #[serde(rename = "max-files")]
    pub max_files: usize,

    /// Payload megabytes per archive before rotating (floor 50, ceiling 4096)
    #[serde(rename = "max-megabytes")]
    pub max_megabytes: u64,

    /// Entry name template with `{code}`, `{seq}` and `{ext}` placeholders
    #[serde(rename = "naming-pattern")]
    pub naming_pattern: String,

    /// Nest entries under a per-code directory
    #[serde(rename = "group-by-code")]
    pub group_by_code: bool,
}

impl ArchiveConfig {
    /// Byte ceiling derived from `max_megabytes`
    pub fn max_bytes(&self) -> u64 {
        self.max_megabytes.saturating_mul(1024 * 1024)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: "./archives".to_string(),
            prefix: "images".to_string(),
            extension: "zip".to_string(),
            max_files: 300,
            max_megabytes: 200,
            naming_pattern: "{code}_{seq}{ext}".to_string(),
            group_by_code: false,
        }
    }
}

/// Report export destinations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: String,

    #[serde(rename = "failures-path")]
    pub failures_path: String,

    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: "report.csv".to_string(),
            failures_path: "failures.csv".to_string(),
            format: ReportFormat::Csv,
        }
    }
}

/// Tabular serialization used for report exports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// RFC 4180 CSV; delimiters and newlines are quoted
    #[default]
    Csv,
    /// Unquoted comma-separated lines; field text is flattened
    Flat,
}

/// Remote upload endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,

    #[serde(rename = "folder-id", default)]
    pub folder_id: Option<String>,

    #[serde(default)]
    pub session: Option<String>,

    /// Concurrent uploads, clamped to [1, 4]
    #[serde(default = "default_upload_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub mode: UploadMode,
}

fn default_upload_concurrency() -> usize {
    2
}

/// What gets pushed to the upload endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Each finished archive
    #[default]
    Archives,
    /// Each fetched image
    Files,
}
