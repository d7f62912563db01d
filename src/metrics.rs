//! Controller counters
//!
//! Dropped tasks are otherwise visible only in the log; the `dropped` counter
//! makes retry-budget exhaustion observable to whatever embeds the operator.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ControllerMetrics {
    reconciled: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reconciled: u64,
    pub failures: u64,
    pub retries: u64,
    pub dropped: u64,
    pub queue_depth: usize,
}

impl ControllerMetrics {
    pub fn record_success(&self) {
        self.reconciled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_depth: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            reconciled: self.reconciled.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_count_retries_and_drops() {
        let metrics = ControllerMetrics::default();
        metrics.record_success();
        metrics.record_retry();
        metrics.record_retry();
        metrics.record_drop();

        let snap = metrics.snapshot(4);
        assert_eq!(snap.reconciled, 1);
        assert_eq!(snap.retries, 2);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.failures, 3);
        assert_eq!(snap.queue_depth, 4);
    }
}
