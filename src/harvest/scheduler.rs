//! Shared job cursor for the worker pool
//!
//! This module handles:
//! - Handing out each job exactly once across all workers
//! - Holding workers back while the run is paused
//! - Stopping hand-out once the run is cancelled

use crate::harvest::job_builder::Job;
use crate::state::ControlSignal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Ordered queue of jobs shared by all workers
#[derive(Debug)]
pub struct JobQueue {
    pending: Mutex<VecDeque<Job>>,
    total: usize,
    dispatched: AtomicUsize,
}

impl JobQueue {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            total: jobs.len(),
            pending: Mutex::new(jobs.into()),
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Gets the next job for a worker
    ///
    /// Waits while the run is paused. The control state is checked before
    /// taking a job, so no job is handed out after cancellation has been
    /// observed.
    ///
    /// # Returns
    ///
    /// * `Some(Job)` - The job to process
    /// * `None` - The queue is exhausted or the run was cancelled
    pub async fn next_job(&self, signal: &mut ControlSignal) -> Option<Job> {
        if !signal.wait_runnable().await {
            return None;
        }

        let job = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.pop_front()
        }?;

        self.dispatched.fetch_add(1, Ordering::SeqCst);
        Some(job)
    }

    /// Number of jobs the queue started with
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of jobs handed out so far
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Number of jobs not yet handed out
    pub fn remaining(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
