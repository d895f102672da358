//! Per-run shared state.
//!
//! A `RunContext` owns the only mutable state shared across workers: the
//! result cache, the statistics counters and the cancellation token. It is
//! passed explicitly to every pipeline component, so several runs can execute
//! side by side in one process without interfering.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{CacheConfig, ResultCache};
use crate::stats::{RunStatistics, StatsSnapshot};

#[derive(Debug, Clone)]
pub struct RunContext {
    cache: Arc<ResultCache>,
    stats: Arc<RunStatistics>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Fresh context with its own cache.
    pub fn new(cache: CacheConfig) -> Self {
        Self::with_cache(Arc::new(ResultCache::new(cache)))
    }

    /// Fresh statistics and token, reusing an existing cache. Lets a
    /// long-lived process keep lookups warm across runs.
    pub fn with_cache(cache: Arc<ResultCache>) -> Self {
        Self {
            cache,
            stats: Arc::new(RunStatistics::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Run-start signal: zero the statistics.
    ///
    /// Cancellation is not undone. A cancelled context stays cancelled, and
    /// every later run on it reports its identifiers as cancelled. Start the
    /// next run with [`RunContext::with_cache`] over [`shared_cache`] to keep
    /// the cache and get a fresh token.
    ///
    /// [`shared_cache`]: RunContext::shared_cache
    pub fn begin_run(&self) {
        self.stats.reset();
    }

    /// Run-end signal: final statistics.
    pub fn finish_run(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn shared_cache(&self) -> Arc<ResultCache> {
        Arc::clone(&self.cache)
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Token to hand to signal handlers or a parent task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop submitting new work. In-flight requests finish or time out;
    /// pending backoff and pacing waits end immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_run_resets_stats_but_keeps_cache() {
        let ctx = RunContext::default();
        ctx.stats().add_total(5);
        ctx.begin_run();
        assert_eq!(ctx.stats().snapshot().total, 0);

        let next = RunContext::with_cache(ctx.shared_cache());
        assert!(Arc::ptr_eq(&ctx.shared_cache(), &next.shared_cache()));
    }

    #[test]
    fn cancellation_survives_begin_run() {
        let ctx = RunContext::default();
        ctx.cancel();
        ctx.begin_run();
        assert!(ctx.is_cancelled());

        let next = RunContext::with_cache(ctx.shared_cache());
        assert!(!next.is_cancelled());
    }

    #[test]
    fn contexts_are_independent() {
        let a = RunContext::default();
        let b = RunContext::default();
        a.cancel();
        a.stats().record_retry();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(b.stats().snapshot().retries, 0);
    }
}
