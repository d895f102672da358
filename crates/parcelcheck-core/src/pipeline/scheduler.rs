//! Batch scheduler: contiguous batches, strictly one after another.
//!
//! # Output ordering
//! The combined sequence is batch-ordered (every outcome of batch *n* comes
//! before any outcome of batch *n + 1*), but completion-ordered within a
//! batch. It is not sorted by identifier or by input position; consumers that
//! need input order must re-sort.

use std::sync::Arc;

use tracing::info;

use super::pool::{cancelled_outcomes, BatchResult, WorkerPool};
use super::resolver::Resolver;
use crate::context::RunContext;
use crate::identifier::CanonicalIdentifier;
use crate::outcome::LookupOutcome;
use crate::policy::pacing::{sleep_or_cancel, JitterRange};

/// Number of batches needed for `items` identifiers at `batch_size` each.
pub fn batch_count(items: usize, batch_size: usize) -> usize {
    items.div_ceil(batch_size.max(1))
}

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    batch_pause: JitterRange,
    pool: WorkerPool,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, batch_pause: JitterRange, pool: WorkerPool) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_pause,
            pool,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run every batch in order and concatenate their outcomes.
    ///
    /// A pause precedes every batch except the first. Once the run is
    /// cancelled no further batch starts; the identifiers it would have
    /// covered are reported as cancelled.
    pub async fn run(
        &self,
        ids: &[CanonicalIdentifier],
        resolver: &Arc<Resolver>,
        ctx: &RunContext,
    ) -> Vec<(CanonicalIdentifier, LookupOutcome)> {
        let total_batches = batch_count(ids.len(), self.batch_size);
        let cancel = ctx.cancellation_token();
        let mut all = Vec::with_capacity(ids.len());

        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            let batch = index + 1;

            if index > 0 {
                let pause = self.batch_pause.sample();
                info!(batch, pause_ms = pause.as_millis() as u64, "waiting before next batch");
                sleep_or_cancel(pause, &cancel).await;
            }
            if ctx.is_cancelled() {
                let remaining = &ids[index * self.batch_size..];
                info!(batch, skipped = remaining.len(), "run cancelled, not starting remaining batches");
                all.extend(cancelled_outcomes(remaining, ctx));
                break;
            }

            info!(batch, total_batches, size = chunk.len(), "starting batch");
            let result: BatchResult = self.pool.run_batch(batch, chunk, resolver, ctx).await;
            info!(
                batch,
                succeeded = result.succeeded(),
                size = chunk.len(),
                "batch completed"
            );
            all.extend(result.outcomes);

            let done = (index * self.batch_size + chunk.len()).min(ids.len());
            info!(done, total = ids.len(), "progress");
        }

        all
    }
}
