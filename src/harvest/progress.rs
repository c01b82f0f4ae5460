//! Run progress reporting
//!
//! A snapshot is published after every finished job. Throughput and ETA are
//! derived from elapsed time and the completed count, at most once per
//! second.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Minimum spacing between throughput/ETA recomputations
const RATE_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time view of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Status of the most recently finished job
    pub message: String,
    /// Jobs per second, once measurable
    pub throughput: Option<f64>,
    pub eta: Option<Duration>,
}

impl Progress {
    pub fn idle(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct RateWindow {
    last_computed: Option<Instant>,
    throughput: Option<f64>,
    eta: Option<Duration>,
}

/// Publishes [`Progress`] snapshots on a watch channel
#[derive(Debug)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<Progress>>,
    started: Instant,
    total: usize,
    completed: AtomicUsize,
    window: Mutex<RateWindow>,
}

impl ProgressTracker {
    /// Starts tracking a run of `total` jobs on an existing channel
    pub fn new(tx: Arc<watch::Sender<Progress>>, total: usize) -> Self {
        tx.send_replace(Progress::idle(total));
        Self {
            tx,
            started: Instant::now(),
            total,
            completed: AtomicUsize::new(0),
            window: Mutex::new(RateWindow::default()),
        }
    }

    /// Records one finished job and publishes a snapshot
    ///
    /// Returns the completed count including this job.
    pub fn record(&self, message: impl Into<String>) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let (throughput, eta) = self.rates(completed);

        self.tx.send_replace(Progress {
            completed,
            total: self.total,
            message: message.into(),
            throughput,
            eta,
        });
        completed
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn rates(&self, completed: usize) -> (Option<f64>, Option<Duration>) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let due = window
            .last_computed
            .map(|at| now.duration_since(at) >= RATE_INTERVAL)
            .unwrap_or(true);

        if due {
            let elapsed = now.duration_since(self.started).as_secs_f64();
            if elapsed > 0.0 {
                let rate = completed as f64 / elapsed;
                let remaining = self.total.saturating_sub(completed);
                window.throughput = Some(rate);
                window.eta = (rate > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / rate));
                window.last_computed = Some(now);

                tracing::info!(
                    "Progress: {}/{} done, {:.2} images/sec, ETA {}s",
                    completed,
                    self.total,
                    rate,
                    window.eta.map(|d| d.as_secs()).unwrap_or(0)
                );
            }
        }

        (window.throughput, window.eta)
    }
}
