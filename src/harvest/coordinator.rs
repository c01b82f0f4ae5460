//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the worker pool that drives a run, including:
//! - Building the job list and shared run state
//! - Spawning the workers and waiting for them
//! - Handing payloads to the batch accumulator and saving finished archives
//! - Feeding the uploader
//! - Producing the final report and summary

use crate::archive::{
    entry_name, AddOutcome, ArchiveSink, BatchAccumulator, BatchLimits, ClosedArchive,
    LocalDirSink, SavedArchive,
};
use crate::config::{Config, UploadMode};
use crate::harvest::fetcher::{build_http_client, fetch_with_retry, validate_content, FetchPolicy};
use crate::harvest::job_builder::{build_jobs, Job};
use crate::harvest::progress::{Progress, ProgressTracker};
use crate::harvest::scheduler::JobQueue;
use crate::input::ProductRecord;
use crate::output::{OutcomeRow, ReportBuilder, RunOutcome, RunSummary};
use crate::state::{ControlSignal, HostLimiter, RunControl};
use crate::upload::{UploadItem, Uploader};
use crate::{ArchiveError, ArchiveResult, FetchError, HarvestError};
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// One row per completed job, in completion order
    pub rows: Vec<OutcomeRow>,
    /// One row per finished upload
    pub uploads: Vec<OutcomeRow>,
    pub archives: Vec<SavedArchive>,
}

impl RunReport {
    fn empty() -> Self {
        Self {
            summary: RunSummary::empty(),
            rows: Vec::new(),
            uploads: Vec::new(),
            archives: Vec::new(),
        }
    }

    /// Failed rows only
    pub fn failures(&self) -> Vec<OutcomeRow> {
        self.rows.iter().filter(|r| !r.is_ok()).cloned().collect()
    }
}

/// Main harvest coordinator structure
///
/// One coordinator drives one run. The control handle and progress channel
/// can be obtained before [`Coordinator::run`] is called.
pub struct Coordinator {
    config: Arc<Config>,
    records: Vec<ProductRecord>,
    control: RunControl,
    progress: Arc<watch::Sender<Progress>>,
    sink: Option<Arc<dyn ArchiveSink>>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The configuration is used as given; clamping happens when it is
    /// loaded.
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `records` - Products to harvest, in sheet order
    pub fn new(config: Config, records: Vec<ProductRecord>) -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self {
            config: Arc::new(config),
            records,
            control: RunControl::new(),
            progress: Arc::new(tx),
            sink: None,
        }
    }

    /// Saves archives somewhere other than `archive.output-dir`
    pub fn with_sink(mut self, sink: Arc<dyn ArchiveSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle for pausing, resuming and cancelling the run
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Receiver for progress snapshots
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// The job list this coordinator will work through
    pub fn jobs(&self) -> Vec<Job> {
        build_jobs(
            &self.records,
            self.config.download.max_per_product,
            &self.config.hosts,
        )
    }

    /// Runs the harvest to completion or cancellation
    ///
    /// Per-job failures end up in the report. Only client construction,
    /// archive packaging and archive saving errors abort the run.
    pub async fn run(&self) -> Result<RunReport, HarvestError> {
        let jobs = self.jobs();
        if jobs.is_empty() {
            tracing::warn!("No links passed the host filters, nothing to do");
            return Ok(RunReport::empty());
        }

        let total = jobs.len();
        let pool_size = self.config.download.pool_size.clamp(1, 12);
        tracing::info!(
            "Starting harvest: {} jobs, {} workers, {} per host",
            total,
            pool_size,
            self.config.download.per_host_limit
        );

        let client = build_http_client(&self.config.download.user_agent)?;
        let sink: Arc<dyn ArchiveSink> = match &self.sink {
            Some(sink) => sink.clone(),
            None => Arc::new(LocalDirSink::new(&self.config.archive.output_dir)?),
        };

        let ctx = Arc::new(RunContext::new(
            self.config.clone(),
            jobs,
            client,
            sink,
            self.control.clone(),
            self.progress.clone(),
        ));

        let mut workers = JoinSet::new();
        for worker_id in 0..pool_size {
            workers.spawn(worker_loop(ctx.clone(), worker_id));
        }

        let mut worker_error = None;
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
                self.control.cancel();
                worker_error = Some(HarvestError::Worker(e.to_string()));
            }
        }

        if let Some(e) = ctx.take_fatal() {
            tracing::error!("Archive step failed, run aborted: {}", e);
            if let Some(uploader) = &ctx.uploader {
                uploader.finish().await;
            }
            return Err(HarvestError::Archive(e));
        }
        if let Some(e) = worker_error {
            return Err(e);
        }

        tracing::debug!(
            "Workers stopped: {} of {} jobs dispatched, {} never started",
            ctx.queue.dispatched(),
            total,
            ctx.queue.remaining()
        );

        // Whatever is left in the open batch, also after cancellation
        let last = {
            let mut accumulator = ctx.lock_accumulator();
            tracing::debug!(
                "Closing last batch ({} files, {} bytes)",
                accumulator.open_file_count(),
                accumulator.open_byte_size()
            );
            accumulator.finalize()?
        };
        if let Some(archive) = last {
            ctx.save_archive(archive).await?;
        }

        if let Some(uploader) = &ctx.uploader {
            uploader.finish().await;
        }

        let report = ctx.into_report(self.control.is_cancelled());
        tracing::info!("Harvest finished: {}", report.summary);
        Ok(report)
    }
}

/// State shared by all workers of one run
struct RunContext {
    config: Arc<Config>,
    client: Client,
    queue: JobQueue,
    limiter: Arc<HostLimiter>,
    policy: FetchPolicy,
    accumulator: Mutex<BatchAccumulator>,
    sink: Arc<dyn ArchiveSink>,
    uploader: Option<Arc<Uploader>>,
    report: Arc<ReportBuilder>,
    progress: ProgressTracker,
    archives: Mutex<Vec<SavedArchive>>,
    fatal: Mutex<Option<ArchiveError>>,
    control: RunControl,
}

impl RunContext {
    fn new(
        config: Arc<Config>,
        jobs: Vec<Job>,
        client: Client,
        sink: Arc<dyn ArchiveSink>,
        control: RunControl,
        progress: Arc<watch::Sender<Progress>>,
    ) -> Self {
        let limiter = Arc::new(HostLimiter::new(config.download.per_host_limit));
        let policy = FetchPolicy::from_config(&config.download);
        let report = Arc::new(ReportBuilder::new());

        let accumulator = BatchAccumulator::new(
            BatchLimits {
                max_files: config.archive.max_files,
                max_bytes: config.archive.max_bytes(),
            },
            config.archive.prefix.clone(),
            config.archive.extension.clone(),
        );

        let uploader = config.upload.as_ref().map(|upload| {
            Arc::new(Uploader::new(
                upload,
                client.clone(),
                policy.retry,
                limiter.clone(),
                report.clone(),
                control.clone(),
            ))
        });

        Self {
            progress: ProgressTracker::new(progress, jobs.len()),
            queue: JobQueue::new(jobs),
            config,
            client,
            limiter,
            policy,
            accumulator: Mutex::new(accumulator),
            sink,
            uploader,
            report,
            archives: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
            control,
        }
    }

    fn lock_accumulator(&self) -> std::sync::MutexGuard<'_, BatchAccumulator> {
        self.accumulator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn upload_mode(&self) -> Option<UploadMode> {
        self.config.upload.as_ref().map(|u| u.mode)
    }

    /// Records the first fatal error and cancels the run
    fn fail_run(&self, error: ArchiveError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(error);
        }
        self.control.cancel();
    }

    fn take_fatal(&self) -> Option<ArchiveError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Writes a closed archive through the sink and queues its upload
    async fn save_archive(&self, archive: ClosedArchive) -> ArchiveResult<()> {
        let sink = self.sink.clone();
        let (archive, path) = tokio::task::spawn_blocking(move || {
            let path = sink.store(&archive)?;
            Ok::<_, ArchiveError>((archive, path))
        })
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))??;

        self.archives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SavedArchive::new(&archive, path));

        if self.upload_mode() == Some(UploadMode::Archives) {
            if let Some(uploader) = &self.uploader {
                uploader
                    .enqueue(UploadItem {
                        filename: archive.name,
                        data: archive.data,
                        code: String::new(),
                        source_url: String::new(),
                        archive_index: Some(archive.index),
                    })
                    .await;
            }
        }
        Ok(())
    }

    fn into_report(self: Arc<Self>, cancelled: bool) -> RunReport {
        let rows = self.report.rows();
        let uploads = self.report.upload_rows();
        let archives = self
            .archives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let total = self.queue.total();
        let completed = rows.len();
        let failed = rows.iter().filter(|r| !r.is_ok()).count();
        let uploads_ok = uploads.iter().filter(|r| r.is_ok()).count();

        let summary = RunSummary {
            outcome: RunOutcome::from_counts(total, completed, failed, cancelled),
            total_jobs: total,
            completed,
            succeeded: completed - failed,
            failed,
            archives: archives.len(),
            uploads_ok,
            uploads_failed: uploads.len() - uploads_ok,
            elapsed: self.progress.elapsed(),
        };

        RunReport {
            summary,
            rows,
            uploads,
            archives,
        }
    }
}

/// One worker: take jobs until the queue is empty or the run is cancelled
async fn worker_loop(ctx: Arc<RunContext>, worker_id: usize) {
    let mut signal = ctx.control.subscribe();
    let mut processed = 0usize;

    while let Some(job) = ctx.queue.next_job(&mut signal).await {
        match process_job(&ctx, &job, &mut signal).await {
            Ok(Some(row)) => {
                let message = match &row.error_message {
                    None => format!("ok {} {}", job.code, job.url),
                    Some(error) => format!("fail {} {}: {}", job.code, job.url, error),
                };
                ctx.report.record(row);
                ctx.progress.record(message);
                processed += 1;
            }
            Ok(None) => {
                tracing::debug!("Worker {} interrupted on {}", worker_id, job.url);
                break;
            }
            Err(e) => {
                ctx.fail_run(e);
                break;
            }
        }
    }

    tracing::debug!("Worker {} done after {} jobs", worker_id, processed);
}

/// Processes a single job
///
/// # Returns
///
/// * `Ok(Some(row))` - The job finished, successfully or not
/// * `Ok(None)` - The run was cancelled while the job waited; not reported
/// * `Err(ArchiveError)` - Packaging or saving failed; the run must stop
async fn process_job(
    ctx: &Arc<RunContext>,
    job: &Job,
    signal: &mut ControlSignal,
) -> ArchiveResult<Option<OutcomeRow>> {
    let slot = tokio::select! {
        slot = ctx.limiter.acquire(job.host_key()) => slot,
        _ = signal.cancelled() => None,
    };
    let Some(slot) = slot else {
        return Ok(None);
    };

    // The slot bounds requests only; it is dropped on every path out of here
    let fetched = fetch_with_retry(&ctx.client, &job.url, &ctx.policy, signal).await;
    drop(slot);

    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(FetchError::Cancelled) => return Ok(None),
        Err(e) => {
            tracing::warn!("Failed {} ({}): {}", job.url, job.code, e);
            return Ok(Some(OutcomeRow::failure(job, &e)));
        }
    };

    if let Err(e) = validate_content(&job.url, &fetched, ctx.policy.require_image) {
        tracing::warn!("Rejected {} ({}): {}", job.url, job.code, e);
        return Ok(Some(OutcomeRow::failure(job, &e)));
    }

    let archive_cfg = &ctx.config.archive;
    let name = entry_name(
        &archive_cfg.naming_pattern,
        &job.code,
        &job.seq,
        &fetched.extension(),
        archive_cfg.group_by_code,
    );

    let status = fetched.status;
    let size = fetched.size();
    let (outcome, body) = add_to_batch(ctx, name, fetched.body).await?;
    if let Some(closed) = outcome.closed {
        ctx.save_archive(closed).await?;
    }

    let row = OutcomeRow::success(job, status, size, &outcome.placement);

    if ctx.upload_mode() == Some(UploadMode::Files) {
        if let Some(uploader) = &ctx.uploader {
            let filename = outcome
                .placement
                .entry_name
                .rsplit('/')
                .next()
                .unwrap_or(&outcome.placement.entry_name)
                .to_string();
            uploader
                .enqueue(UploadItem {
                    filename,
                    data: body,
                    code: job.code.clone(),
                    source_url: job.url.clone(),
                    archive_index: Some(outcome.placement.archive_index),
                })
                .await;
        }
    }

    tracing::debug!(
        "Stored {} as {} in part {}",
        job.url,
        outcome.placement.entry_name,
        outcome.placement.archive_index
    );
    Ok(Some(row))
}

/// Checks limits, rotates and compresses under one lock, off the async
/// workers
///
/// The payload is handed back for a possible file upload.
async fn add_to_batch(
    ctx: &Arc<RunContext>,
    name: String,
    body: Vec<u8>,
) -> ArchiveResult<(AddOutcome, Vec<u8>)> {
    let ctx = Arc::clone(ctx);
    tokio::task::spawn_blocking(move || {
        let outcome = ctx.lock_accumulator().add(&name, &body)?;
        Ok::<_, ArchiveError>((outcome, body))
    })
    .await
    .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}
