use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of a run as seen by the workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlState {
    /// Workers pick up jobs
    Running,
    /// Workers finish their current job, then wait
    Paused,
    /// Terminal: no new job starts
    Cancelled,
}

/// Per-run control handle for pause, resume and cancel
///
/// Cloning yields another handle to the same run. Every transition is
/// idempotent, and cancel is one-way.
#[derive(Debug, Clone)]
pub struct RunControl {
    tx: Arc<watch::Sender<ControlState>>,
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Current state
    pub fn state(&self) -> ControlState {
        *self.tx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == ControlState::Cancelled
    }

    /// Pauses a running run; returns true if the state changed
    pub fn pause(&self) -> bool {
        self.transition(ControlState::Paused)
    }

    /// Resumes a paused run; returns true if the state changed
    pub fn resume(&self) -> bool {
        self.transition(ControlState::Running)
    }

    /// Cancels the run; returns true if the state changed
    pub fn cancel(&self) -> bool {
        self.transition(ControlState::Cancelled)
    }

    fn transition(&self, next: ControlState) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == ControlState::Cancelled || *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            tracing::info!("Run control: {:?}", next);
        }
        changed
    }

    /// Creates a receiver for workers
    pub fn subscribe(&self) -> ControlSignal {
        ControlSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side view of a [`RunControl`]
#[derive(Debug, Clone)]
pub struct ControlSignal {
    rx: watch::Receiver<ControlState>,
}

impl ControlSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() == ControlState::Cancelled
    }

    /// Waits while the run is paused
    ///
    /// Returns true when the worker may start its next job and false once the
    /// run has been cancelled.
    pub async fn wait_runnable(&mut self) -> bool {
        match self
            .rx
            .wait_for(|state| *state != ControlState::Paused)
            .await
        {
            Ok(state) => *state == ControlState::Running,
            Err(_) => false,
        }
    }

    /// Resolves once the run is cancelled
    ///
    /// Never resolves if every control handle is gone without cancelling.
    pub async fn cancelled(&mut self) {
        if self
            .rx
            .wait_for(|state| *state == ControlState::Cancelled)
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }
}
