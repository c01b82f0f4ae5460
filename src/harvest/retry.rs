//! Retry with linear backoff and jitter
//!
//! Shared by the download fetcher and the uploader. The delay before attempt
//! `n + 1` is `backoff_base * n` plus a random jitter, and the sleep is cut
//! short if the run is cancelled.

use crate::state::ControlSignal;
use crate::{FetchError, UploadError};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Upper bound of the random jitter added to every backoff (milliseconds)
pub const MAX_JITTER_MS: u64 = 400;

/// Errors the retry loop knows how to classify
pub trait RetryableError: Display {
    /// Whether another attempt could change the outcome
    fn is_retryable(&self) -> bool;

    /// The value returned when a backoff sleep is interrupted by cancellation
    fn cancelled() -> Self;
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }

    fn cancelled() -> Self {
        FetchError::Cancelled
    }
}

impl RetryableError for UploadError {
    fn is_retryable(&self) -> bool {
        UploadError::is_retryable(self)
    }

    fn cancelled() -> Self {
        UploadError::Cancelled
    }
}

/// Attempt budget and backoff timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub backoff_base: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_base,
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };
        self.backoff_base * attempt + Duration::from_millis(jitter)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent
///
/// `op` receives the 1-based attempt number. The last error is returned
/// as-is. If the run is cancelled during a backoff sleep, `E::cancelled()` is
/// returned instead of starting another attempt.
///
/// # Arguments
///
/// * `policy` - Attempt budget and backoff timing
/// * `signal` - Run control used to interrupt backoff sleeps
/// * `label` - What is being attempted, for logs
/// * `op` - The attempt itself
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    signal: &mut ControlSignal,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    E: RetryableError,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= attempts {
            return Err(error);
        }

        let delay = policy.delay_after(attempt);
        tracing::debug!(
            "{}: attempt {}/{} failed ({}), retrying in {:?}",
            label,
            attempt,
            attempts,
            error,
            delay
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = signal.cancelled() => return Err(E::cancelled()),
        }
        attempt += 1;
    }
}
