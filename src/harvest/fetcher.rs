//! HTTP fetcher implementation
//!
//! This module handles all image requests for a run, including:
//! - Building the HTTP client with the configured user agent
//! - Single fetch attempts with an independent timeout
//! - Retry with backoff through [`with_backoff`]
//! - Error classification
//! - Content validation (image responses only, when required)

use crate::config::DownloadConfig;
use crate::harvest::retry::{with_backoff, RetryPolicy};
use crate::state::ControlSignal;
use crate::url::{infer_extension, extension_or_fallback};
use crate::FetchError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// File extension (with dot) for the payload
    pub fn extension(&self) -> String {
        extension_or_fallback(&self.final_url, self.content_type.as_deref())
    }
}

/// Per-run fetch settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub retry: RetryPolicy,
    /// Timeout of a single attempt
    pub timeout: Duration,
    pub require_image: bool,
}

impl FetchPolicy {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.backoff_base_ms),
            ),
            timeout: Duration::from_millis(config.timeout_ms),
            require_image: config.require_image,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed with reqwest's default policy. Timeouts are set per
/// request, not on the client.
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header sent with every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs a single GET attempt
///
/// Any non-2xx status is a failure. The timeout covers the whole attempt,
/// including reading the body.
pub async fn fetch_once(client: &Client, url: &str, timeout: Duration) -> Result<Fetched, FetchError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Body(e.to_string())
        }
    })?;

    Ok(Fetched {
        final_url,
        status: status.as_u16(),
        content_type,
        body: body.to_vec(),
    })
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Unparsable URL | Immediate failure |
/// | Non-2xx status (4xx and 5xx alike) | Retry |
/// | Timeout | Retry |
/// | Connection or body error | Retry |
/// | Cancelled during backoff | `FetchError::Cancelled` |
///
/// Content validation happens separately in [`validate_content`].
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    policy: &FetchPolicy,
    signal: &mut ControlSignal,
) -> Result<Fetched, FetchError> {
    if let Err(e) = url::Url::parse(url) {
        return Err(FetchError::Network(format!("Invalid URL: {}", e)));
    }

    let timeout = policy.timeout;
    with_backoff(&policy.retry, signal, url, |_| fetch_once(client, url, timeout)).await
}

/// Checks a fetched response against the content policy
///
/// With `require_image`, the Content-Type must be `image/*`. A missing
/// Content-Type is tolerated when the URL itself ends in a known image
/// extension.
pub fn validate_content(url: &str, fetched: &Fetched, require_image: bool) -> Result<(), FetchError> {
    if !require_image {
        return Ok(());
    }

    match fetched.content_type.as_deref() {
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        Some(ct) => Err(FetchError::ContentPolicy {
            content_type: ct.to_string(),
        }),
        None if infer_extension(url, None).is_some() => Ok(()),
        None => Err(FetchError::ContentPolicy {
            content_type: "(none)".to_string(),
        }),
    }
}

fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Network(format!("Connection failed: {}", error))
    } else {
        FetchError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(content_type: Option<&str>) -> Fetched {
        Fetched {
            final_url: "https://cdn.example.com/a".to_string(),
            status: 200,
            content_type: content_type.map(str::to_string),
            body: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client("image-harvest/test").is_ok());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = FetchPolicy::from_config(&DownloadConfig::default());
        assert_eq!(policy.retry.attempts, 3);
        assert_eq!(policy.retry.backoff_base, Duration::from_millis(800));
        assert_eq!(policy.timeout, Duration::from_millis(15_000));
        assert!(policy.require_image);
    }

    #[test]
    fn test_validate_image_content_type() {
        assert!(validate_content("https://x.com/a", &fetched(Some("image/png")), true).is_ok());
        assert!(validate_content("https://x.com/a", &fetched(Some("Image/JPEG")), true).is_ok());
    }

    #[test]
    fn test_validate_rejects_html() {
        let result = validate_content("https://x.com/a.jpg", &fetched(Some("text/html")), true);
        assert_eq!(
            result,
            Err(FetchError::ContentPolicy {
                content_type: "text/html".to_string()
            })
        );
    }

    #[test]
    fn test_validate_missing_content_type() {
        assert!(validate_content("https://x.com/a.webp", &fetched(None), true).is_ok());
        assert!(validate_content("https://x.com/a", &fetched(None), true).is_err());
    }

    #[test]
    fn test_validation_disabled() {
        assert!(validate_content("https://x.com/a", &fetched(Some("text/html")), false).is_ok());
    }

    #[test]
    fn test_extension_from_fetched() {
        assert_eq!(fetched(Some("image/jpeg")).extension(), ".jpg");
        assert_eq!(fetched(None).extension(), ".bin");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_retry() {
        let client = build_http_client("test").unwrap();
        let control = crate::state::RunControl::new();
        let mut signal = control.subscribe();
        let policy = FetchPolicy::from_config(&DownloadConfig::default());

        let result = fetch_with_retry(&client, "not a url", &policy, &mut signal).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
