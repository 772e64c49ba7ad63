use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::time::Instant;

/// Lifetime counters of a [`Pool`].
///
/// [`Pool`]: super::Pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    create_failures: AtomicUsize,
    total_waiting: AtomicU64,
}

// 64bit microseconds is 580000 years - really not important
#[allow(clippy::cast_possible_truncation)]
impl PoolMetrics {
    pub(crate) fn record_created(&self) {
        let _ = self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroyed(&self) {
        let _ = self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_create_failure(&self) {
        let _ = self.create_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_waiting(&self, start: Instant) {
        let waiting = start.elapsed().as_micros() as u64;
        let _ = self.total_waiting.fetch_add(waiting, Ordering::Relaxed);
    }
}

impl PoolMetrics {
    /// Number of resources the factory produced, warm-up included.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of destructor invocations, failed ones included.
    #[must_use]
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Number of failed factory invocations.
    #[must_use]
    pub fn create_failures(&self) -> usize {
        self.create_failures.load(Ordering::Relaxed)
    }

    /// Total number of microseconds callers spent parked waiting for a
    /// resource.
    #[must_use]
    pub fn microseconds_waiting(&self) -> u64 {
        self.total_waiting.load(Ordering::Relaxed)
    }
}
