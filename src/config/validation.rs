use crate::config::types::{ArchiveConfig, Config, DownloadConfig, HostFilterConfig, UploadConfig};
use crate::ConfigError;
use url::Url;

/// Megabyte floor for a single archive
const MIN_ARCHIVE_MEGABYTES: u64 = 50;

/// Megabyte ceiling for a single archive
const MAX_ARCHIVE_MEGABYTES: u64 = 4096;

/// File-count floor for a single archive
const MIN_ARCHIVE_FILES: usize = 50;

/// Clamps numeric limits into their safe ranges and validates the rest
///
/// Out-of-range numbers are corrected silently (with a debug log); structural
/// problems such as an empty prefix or a malformed endpoint are rejected.
pub fn normalize(mut config: Config) -> Result<Config, ConfigError> {
    clamp_download_config(&mut config.download);
    clamp_archive_config(&mut config.archive);
    if let Some(upload) = config.upload.as_mut() {
        upload.concurrency = upload.concurrency.clamp(1, 4);
    }

    validate_download_config(&config.download)?;
    validate_host_filters(&config.hosts)?;
    validate_archive_config(&config.archive)?;
    if let Some(upload) = &config.upload {
        validate_upload_config(upload)?;
    }

    Ok(config)
}

fn clamp_download_config(config: &mut DownloadConfig) {
    let pool_size = config.pool_size.clamp(1, 12);
    if pool_size != config.pool_size {
        tracing::debug!("pool-size {} clamped to {}", config.pool_size, pool_size);
        config.pool_size = pool_size;
    }

    let per_host = config.per_host_limit.clamp(1, 8);
    if per_host != config.per_host_limit {
        tracing::debug!(
            "per-host-limit {} clamped to {}",
            config.per_host_limit,
            per_host
        );
        config.per_host_limit = per_host;
    }

    config.retry_attempts = config.retry_attempts.max(1);
}

fn clamp_archive_config(config: &mut ArchiveConfig) {
    config.max_files = config.max_files.max(MIN_ARCHIVE_FILES);
    let megabytes = config
        .max_megabytes
        .clamp(MIN_ARCHIVE_MEGABYTES, MAX_ARCHIVE_MEGABYTES);
    if megabytes != config.max_megabytes {
        tracing::debug!(
            "max-megabytes {} clamped to {}",
            config.max_megabytes,
            megabytes
        );
        config.max_megabytes = megabytes;
    }
}

fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_host_filters(config: &HostFilterConfig) -> Result<(), ConfigError> {
    for suffix in config.allow.iter().chain(config.deny.iter()) {
        validate_host_suffix(suffix)?;
    }
    Ok(())
}

fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.prefix.trim().is_empty() {
        return Err(ConfigError::Validation(
            "archive prefix cannot be empty".to_string(),
        ));
    }

    if config.extension.is_empty() || config.extension.contains(['.', '/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "archive extension must be a bare extension like 'zip', got '{}'",
            config.extension
        )));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    if !config.naming_pattern.contains("{seq}") {
        return Err(ConfigError::Validation(format!(
            "naming-pattern must contain {{seq}}, got '{}'",
            config.naming_pattern
        )));
    }

    Ok(())
}

fn validate_upload_config(config: &UploadConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid upload endpoint: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "Upload endpoint '{}' must use http or https",
            config.endpoint
        )));
    }

    Ok(())
}

/// Validates a host suffix used in the allow/deny lists
fn validate_host_suffix(suffix: &str) -> Result<(), ConfigError> {
    if suffix.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host suffix cannot be empty".to_string(),
        ));
    }

    if !suffix
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host suffix '{}' contains invalid characters",
            suffix
        )));
    }

    if suffix.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host suffix '{}' cannot contain consecutive dots",
            suffix
        )));
    }

    Ok(())
}
