//! Uploader with its own bounded queue
//!
//! Items are queued as they become available (fetched images or finished
//! archives) and uploaded by background tasks, at most `concurrency` at a
//! time. Queueing waits for a free slot, so producers slow down to the
//! endpoint's pace. Every item is tried with the multipart strategy first and the JSON
//! envelope second; each strategy gets the full retry budget.

use crate::config::UploadConfig;
use crate::harvest::{with_backoff, RetryPolicy};
use crate::output::{OutcomeRow, OutcomeStatus, ReportBuilder};
use crate::state::{HostLimiter, RunControl};
use crate::upload::strategy::{read_response, DestinationMeta, UploadPayload, UploadStrategy};
use crate::url::host_of;
use crate::UploadError;
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Timeout of a single upload attempt
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Something waiting to be uploaded
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub filename: String,
    pub data: Vec<u8>,
    /// Product code for file uploads, empty for archives
    pub code: String,
    /// Source link for file uploads, empty for archives
    pub source_url: String,
    pub archive_index: Option<u32>,
}

/// Pushes payloads to the remote endpoint
pub struct Uploader {
    client: Client,
    endpoint: String,
    host: String,
    meta: DestinationMeta,
    retry: RetryPolicy,
    slots: Arc<Semaphore>,
    limiter: Arc<HostLimiter>,
    report: Arc<ReportBuilder>,
    control: RunControl,
    tasks: Mutex<JoinSet<()>>,
}

impl Uploader {
    /// Creates an uploader
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, destination and concurrency
    /// * `client` - Shared HTTP client
    /// * `retry` - Attempt budget per strategy
    /// * `limiter` - Per-host limiter shared with the download pool
    /// * `report` - Where upload outcomes are recorded
    /// * `control` - Run control; no new upload starts after cancellation
    pub fn new(
        config: &UploadConfig,
        client: Client,
        retry: RetryPolicy,
        limiter: Arc<HostLimiter>,
        report: Arc<ReportBuilder>,
        control: RunControl,
    ) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            host: host_of(&config.endpoint).unwrap_or_default(),
            meta: DestinationMeta {
                folder_id: config.folder_id.clone(),
                session: config.session.clone(),
            },
            retry,
            slots: Arc::new(Semaphore::new(config.concurrency.clamp(1, 4))),
            limiter,
            report,
            control,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Uploads one payload, falling back to the JSON envelope if multipart
    /// fails
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Remote reference from whichever strategy succeeded
    /// * `Err(UploadError::Exhausted)` - Both strategies failed
    /// * `Err(UploadError::Cancelled)` - The run was cancelled mid-retry
    pub async fn upload(&self, data: &[u8], filename: &str, mime: &str) -> Result<String, UploadError> {
        let payload = UploadPayload {
            data,
            filename,
            mime,
            meta: &self.meta,
        };

        let mut primary_error = None;
        for strategy in UploadStrategy::ORDER {
            match self.attempt(strategy, &payload).await {
                Ok(reference) => {
                    tracing::info!("Uploaded {} via {}", filename, strategy.name());
                    return Ok(reference);
                }
                Err(UploadError::Cancelled) => return Err(UploadError::Cancelled),
                Err(e) => {
                    tracing::warn!("Upload of {} via {} failed: {}", filename, strategy.name(), e);
                    match primary_error.take() {
                        None => primary_error = Some(e),
                        Some(primary) => {
                            return Err(UploadError::Exhausted {
                                primary: primary.to_string(),
                                fallback: e.to_string(),
                            })
                        }
                    }
                }
            }
        }

        Err(primary_error.unwrap_or(UploadError::Cancelled))
    }

    async fn attempt(
        &self,
        strategy: UploadStrategy,
        payload: &UploadPayload<'_>,
    ) -> Result<String, UploadError> {
        let mut signal = self.control.subscribe();
        let label = format!("upload {} ({})", payload.filename, strategy.name());

        with_backoff(&self.retry, &mut signal, &label, |_| async move {
            let _slot = self
                .limiter
                .acquire(&self.host)
                .await
                .ok_or(UploadError::Cancelled)?;

            let response = strategy
                .build_request(&self.client, &self.endpoint, payload)?
                .timeout(UPLOAD_TIMEOUT)
                .send()
                .await
                .map_err(|e| UploadError::Transport(e.to_string()))?;
            read_response(response).await
        })
        .await
    }

    /// Queues an item for background upload
    ///
    /// Waits for a free upload slot before the item is handed to a task, so
    /// a slow endpoint holds the caller back instead of piling payloads up in
    /// memory. Items queued after the run was cancelled are dropped.
    pub async fn enqueue(self: &Arc<Self>, item: UploadItem) {
        if self.control.is_cancelled() {
            tracing::debug!("Run cancelled, not uploading {}", item.filename);
            return;
        }

        let mut signal = self.control.subscribe();
        let permit = tokio::select! {
            permit = self.slots.clone().acquire_owned() => permit.ok(),
            _ = signal.cancelled() => None,
        };
        let Some(permit) = permit else {
            tracing::debug!("Run cancelled, not uploading {}", item.filename);
            return;
        };

        let uploader = Arc::clone(self);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.spawn(async move {
            let _permit = permit;
            let mime = crate::upload::mime_for(&item.filename);
            let result = uploader.upload(&item.data, &item.filename, mime).await;
            if let Some(row) = upload_row(&item, &uploader.endpoint, result) {
                uploader.report.record_upload(row);
            }
        });
    }

    /// Waits for every queued upload to finish
    pub async fn finish(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Upload task failed: {}", e);
            }
        }
    }
}

/// Outcome row for an upload; None when the upload was cancelled
fn upload_row(
    item: &UploadItem,
    endpoint: &str,
    result: Result<String, UploadError>,
) -> Option<OutcomeRow> {
    let url = if item.source_url.is_empty() {
        endpoint.to_string()
    } else {
        item.source_url.clone()
    };

    let (status, error_message, remote_ref) = match result {
        Ok(reference) => (OutcomeStatus::Ok, None, Some(reference)),
        Err(UploadError::Cancelled) => return None,
        Err(e) => (OutcomeStatus::Fail, Some(e.to_string()), None),
    };

    Some(OutcomeRow {
        code: item.code.clone(),
        url,
        status,
        http_status: None,
        byte_size: Some(item.data.len() as u64),
        final_path: Some(item.filename.clone()),
        archive_index: item.archive_index,
        error_message,
        remote_ref,
    })
}
