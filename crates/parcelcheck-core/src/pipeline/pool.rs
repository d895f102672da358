//! Worker pool: resolves one batch with bounded parallelism.
//!
//! Each identifier runs in its own Tokio task; a semaphore caps how many are
//! talking to the remote service at once. Submissions are staggered and
//! results are collected in completion order with a short pause after each.
//! The pool lives exactly as long as one batch.

use std::any::Any;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::resolver::Resolver;
use crate::context::RunContext;
use crate::identifier::CanonicalIdentifier;
use crate::outcome::{LookupFailure, LookupOutcome};
use crate::policy::pacing::{sleep_or_cancel, PacingConfig};

/// Outcomes of one batch, in completion order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// 1-based batch number.
    pub batch: usize,
    pub outcomes: Vec<(CanonicalIdentifier, LookupOutcome)>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Bounded-parallelism executor for a single batch.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_workers: usize,
    pacing: PacingConfig,
}

impl WorkerPool {
    pub fn new(max_workers: usize, pacing: PacingConfig) -> Self {
        Self {
            max_workers: max_workers.max(1),
            pacing,
        }
    }

    /// Resolve every identifier in `ids`. Each appears exactly once in the
    /// result, even if its task panicked or the run was cancelled before it
    /// was submitted.
    pub async fn run_batch(
        &self,
        batch: usize,
        ids: &[CanonicalIdentifier],
        resolver: &Arc<Resolver>,
        ctx: &RunContext,
    ) -> BatchResult {
        let cancel = ctx.cancellation_token();
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut inflight = FuturesUnordered::new();
        let mut unsubmitted: &[CanonicalIdentifier] = &[];

        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !sleep_or_cancel(self.pacing.submit_stagger.sample(), &cancel).await {
                unsubmitted = &ids[i..];
                break;
            }
            if ctx.is_cancelled() {
                unsubmitted = &ids[i..];
                break;
            }

            let task = {
                let id = id.clone();
                let resolver = Arc::clone(resolver);
                let ctx = ctx.clone();
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquire cannot fail.
                    let _permit = permits.acquire_owned().await.ok();
                    if ctx.is_cancelled() {
                        ctx.stats().record_failure();
                        return LookupOutcome::Failed(LookupFailure::Cancelled);
                    }
                    resolver.resolve(&id, &ctx).await
                })
            };
            let id = id.clone();
            inflight.push(async move { (id, task.await) });
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        while let Some((id, joined)) = inflight.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    let message = if err.is_panic() {
                        panic_message(err.into_panic())
                    } else {
                        err.to_string()
                    };
                    error!(phone = %id, error = %message, "lookup task crashed");
                    ctx.stats().record_failure();
                    LookupOutcome::Failed(LookupFailure::Processing { message })
                }
            };
            outcomes.push((id, outcome));
            sleep_or_cancel(self.pacing.completion_pause.sample(), &cancel).await;
        }

        if !unsubmitted.is_empty() {
            info!(batch, skipped = unsubmitted.len(), "run cancelled, skipping unsubmitted lookups");
            outcomes.extend(cancelled_outcomes(unsubmitted, ctx));
        }

        BatchResult { batch, outcomes }
    }
}

/// Terminal `Cancelled` outcomes for identifiers that never reached a worker.
pub(crate) fn cancelled_outcomes(
    ids: &[CanonicalIdentifier],
    ctx: &RunContext,
) -> Vec<(CanonicalIdentifier, LookupOutcome)> {
    ids.iter()
        .map(|id| {
            ctx.stats().record_failure();
            (id.clone(), LookupOutcome::Failed(LookupFailure::Cancelled))
        })
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::policy::{RetryConfig, RetryPolicy};
    use crate::testing::ScriptedTransport;
    use crate::transport::RawResponse;

    const OK_BODY: &str = r#"{"courierData": {"redx": {"total_parcel": 1, "success_parcel": 1, "cancelled_parcel": 0}}}"#;

    fn ids(n: usize) -> Vec<CanonicalIdentifier> {
        (0..n)
            .map(|i| CanonicalIdentifier::parse(&format!("017{i:08}")).unwrap())
            .collect()
    }

    fn resolver(transport: Arc<ScriptedTransport>) -> Arc<Resolver> {
        Arc::new(Resolver::new(
            transport,
            RetryPolicy::new(RetryConfig::immediate(2)),
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn parallelism_is_bounded() {
        let transport = Arc::new(
            ScriptedTransport::always(Ok(RawResponse::new(200, OK_BODY)))
                .with_delay(Duration::from_millis(20)),
        );
        let pool = WorkerPool::new(3, PacingConfig::none());
        let ctx = RunContext::default();
        let batch = ids(12);

        let result = pool.run_batch(1, &batch, &resolver(transport.clone()), &ctx).await;

        assert_eq!(result.len(), 12);
        assert_eq!(result.succeeded(), 12);
        assert!(transport.max_in_flight() <= 3, "max in flight {}", transport.max_in_flight());
        assert!(transport.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn every_identifier_appears_once() {
        let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(503, ""))));
        let pool = WorkerPool::new(4, PacingConfig::none());
        let ctx = RunContext::default();
        let batch = ids(9);

        let result = pool.run_batch(1, &batch, &resolver(transport), &ctx).await;

        let seen: HashSet<_> = result.outcomes.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(seen.len(), 9);
        assert_eq!(seen, batch.into_iter().collect());
        assert_eq!(ctx.stats().snapshot().failed, 9);
        assert_eq!(ctx.stats().snapshot().retries, 18);
    }

    #[tokio::test]
    async fn panic_is_isolated_to_one_identifier() {
        let batch = ids(3);
        let transport = Arc::new(
            ScriptedTransport::always(Ok(RawResponse::new(200, OK_BODY)))
                .panicking_on(batch[1].as_str()),
        );
        let pool = WorkerPool::new(2, PacingConfig::none());
        let ctx = RunContext::default();

        let result = pool.run_batch(1, &batch, &resolver(transport), &ctx).await;

        assert_eq!(result.len(), 3);
        assert_eq!(result.succeeded(), 2);
        let (_, crashed) = result
            .outcomes
            .iter()
            .find(|(id, _)| id == &batch[1])
            .unwrap();
        match crashed.failure() {
            Some(LookupFailure::Processing { message }) => {
                assert!(message.contains("scripted panic"), "{message}");
            }
            other => panic!("expected processing failure, got {other:?}"),
        }
        let snap = ctx.stats().snapshot();
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.failed, 1);
    }

    #[tokio::test]
    async fn cancelled_run_submits_nothing() {
        let transport = Arc::new(ScriptedTransport::always(Ok(RawResponse::new(200, OK_BODY))));
        let pool = WorkerPool::new(2, PacingConfig::none());
        let ctx = RunContext::default();
        ctx.cancel();

        let result = pool.run_batch(1, &ids(4), &resolver(transport.clone()), &ctx).await;

        assert_eq!(transport.calls(), 0);
        assert_eq!(result.len(), 4);
        assert!(result
            .outcomes
            .iter()
            .all(|(_, o)| o.failure() == Some(&LookupFailure::Cancelled)));
        assert_eq!(ctx.stats().snapshot().failed, 4);
    }
}
