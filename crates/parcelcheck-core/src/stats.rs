//! Run statistics: lock-free counters updated by every worker.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters scoped to one processing run.
///
/// Counters only ever go up during a run; [`reset`](Self::reset) is called
/// once at run start.
#[derive(Debug, Default)]
pub struct RunStatistics {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    inconsistent_payloads: AtomicU64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter. Run-start signal.
    pub fn reset(&self) {
        for counter in [
            &self.total,
            &self.succeeded,
            &self.failed,
            &self.retries,
            &self.cache_hits,
            &self.inconsistent_payloads,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Register `n` identifiers submitted for lookup.
    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inconsistent_payload(&self) {
        self.inconsistent_payloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            cache_hits: self.cache_hits.load(Ordering::SeqCst),
            inconsistent_payloads: self.inconsistent_payloads.load(Ordering::SeqCst),
        }
    }
}

/// Immutable copy of [`RunStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retries: u64,
    pub cache_hits: u64,
    pub inconsistent_payloads: u64,
}

impl StatsSnapshot {
    /// Percentage of submitted identifiers that resolved successfully.
    pub fn success_rate(&self) -> f64 {
        self.succeeded as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Identifiers that have reached a terminal outcome.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_and_reset() {
        let stats = RunStatistics::new();
        stats.add_total(3);
        stats.record_success();
        stats.record_failure();
        stats.record_retry();
        stats.record_retry();
        let snap = stats.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.retries, 2);
        assert_eq!(snap.completed(), 2);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn success_rate_handles_empty_run() {
        assert_eq!(StatsSnapshot::default().success_rate(), 0.0);
        let snap = StatsSnapshot {
            total: 4,
            succeeded: 3,
            ..Default::default()
        };
        assert_eq!(snap.success_rate(), 75.0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(RunStatistics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        stats.record_retry();
                        stats.record_success();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = stats.snapshot();
        assert_eq!(snap.retries, 8_000);
        assert_eq!(snap.succeeded, 8_000);
    }
}
