//! Harvest module: the download/archive orchestration core
//!
//! This module contains the run logic, including:
//! - Expanding product records into fetch jobs
//! - HTTP fetching with retry and backoff
//! - The shared job cursor and worker pool
//! - Progress reporting
//! - Size estimation ahead of a run

mod coordinator;
mod estimate;
mod fetcher;
mod job_builder;
mod progress;
mod retry;
mod scheduler;

pub use coordinator::{Coordinator, RunReport};
pub use estimate::{
    estimate_sizes, extension_distribution, head_size, print_estimate, SizeEstimate, ZIP_FACTOR,
};
pub use fetcher::{
    build_http_client, fetch_once, fetch_with_retry, validate_content, FetchPolicy, Fetched,
};
pub use job_builder::{build_jobs, Job};
pub use progress::{Progress, ProgressTracker};
pub use retry::{with_backoff, RetryPolicy, RetryableError, MAX_JITTER_MS};
pub use scheduler::JobQueue;
