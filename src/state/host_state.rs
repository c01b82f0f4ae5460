use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// In-flight bookkeeping for one destination host
///
/// The semaphore bounds concurrency; the counters exist so the current and
/// peak in-flight numbers can be observed.
#[derive(Debug)]
pub struct HostState {
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl HostState {
    fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Number of requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest in-flight count observed so far
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Per-host concurrency limiter
///
/// `acquire` suspends (without occupying a thread) until fewer than `limit`
/// requests are in flight for the host. The returned [`HostSlot`] releases the
/// slot when dropped, so release happens on every exit path.
#[derive(Debug)]
pub struct HostLimiter {
    limit: usize,
    hosts: Mutex<HashMap<String, Arc<HostState>>>,
}

impl HostLimiter {
    /// Creates a limiter allowing `limit` concurrent requests per host
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Configured per-host limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn state_for(&self, host: &str) -> Arc<HostState> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostState::new(self.limit)))
            .clone()
    }

    /// Waits for a free slot on `host` and takes it
    ///
    /// Returns None only if the underlying semaphore has been closed.
    pub async fn acquire(&self, host: &str) -> Option<HostSlot> {
        let state = self.state_for(host);
        let permit = state.semaphore.clone().acquire_owned().await.ok()?;

        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak.fetch_max(now, Ordering::SeqCst);
        tracing::trace!("Acquired slot on {} ({}/{})", host, now, self.limit);

        Some(HostSlot {
            host: host.to_string(),
            state,
            _permit: permit,
        })
    }

    /// Current in-flight count for a host (0 for unseen hosts)
    pub fn in_flight(&self, host: &str) -> usize {
        self.snapshot(host).map(|s| s.in_flight()).unwrap_or(0)
    }

    /// Peak in-flight count observed for a host (0 for unseen hosts)
    pub fn peak_in_flight(&self, host: &str) -> usize {
        self.snapshot(host).map(|s| s.peak()).unwrap_or(0)
    }

    fn snapshot(&self, host: &str) -> Option<Arc<HostState>> {
        let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts.get(host).cloned()
    }
}

/// A held request slot on one host
///
/// Dropping the slot decrements the host's in-flight counter and returns the
/// permit.
#[derive(Debug)]
pub struct HostSlot {
    host: String,
    state: Arc<HostState>,
    _permit: OwnedSemaphorePermit,
}

impl HostSlot {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for HostSlot {
    fn drop(&mut self) {
        // Counter goes down before the permit is returned
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
