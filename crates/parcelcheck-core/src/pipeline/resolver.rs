//! Single-identifier lookup: cache check → attempt loop → cache write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::error::TransportError;
use crate::identifier::CanonicalIdentifier;
use crate::outcome::{CourierReport, LookupFailure, LookupOutcome};
use crate::policy::pacing::sleep_or_cancel;
use crate::policy::RetryPolicy;
use crate::transport::{LookupTransport, RawResponse};

/// Non-200 bodies are cut to this many characters in failure reasons.
const ERROR_BODY_LIMIT: usize = 100;

/// One attempt, kept only long enough to log it and pick the next step.
#[derive(Debug)]
struct AttemptRecord {
    attempt: u32,
    elapsed: Duration,
    result: Result<CourierReport, LookupFailure>,
}

/// Resolves identifiers against a transport under a retry policy.
pub struct Resolver {
    transport: Arc<dyn LookupTransport>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl Resolver {
    pub fn new(transport: Arc<dyn LookupTransport>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            timeout,
        }
    }

    /// Endpoint of the underlying transport.
    pub fn endpoint(&self) -> &str {
        self.transport.url()
    }

    /// Resolve `id` to a terminal outcome, updating the run's cache and
    /// statistics. Never fails; every problem becomes a [`LookupFailure`].
    pub async fn resolve(&self, id: &CanonicalIdentifier, ctx: &RunContext) -> LookupOutcome {
        if let Some(cached) = ctx.cache().get(id) {
            debug!(phone = %id, "cache hit");
            ctx.stats().record_cache_hit();
            record_terminal(ctx, &cached);
            return cached;
        }

        let mut attempt = 0u32;
        let last_failure = loop {
            let record = self.attempt(id, attempt).await;

            let failure = match record.result {
                Ok(report) => {
                    info!(
                        phone = %id,
                        attempt = record.attempt + 1,
                        elapsed_ms = record.elapsed.as_millis() as u64,
                        "lookup succeeded"
                    );
                    if report.inconsistent {
                        warn!(phone = %id, "payload has inconsistent parcel counters");
                        ctx.stats().record_inconsistent_payload();
                    }
                    let outcome = LookupOutcome::Found(report);
                    ctx.cache().put(id.clone(), outcome.clone());
                    ctx.stats().record_success();
                    return outcome;
                }
                Err(failure) => failure,
            };

            if let LookupFailure::Unexpected { .. } = failure {
                error!(
                    phone = %id,
                    attempt = record.attempt + 1,
                    error = %failure,
                    "unexpected lookup error, not retrying"
                );
            } else {
                warn!(
                    phone = %id,
                    attempt = record.attempt + 1,
                    elapsed_ms = record.elapsed.as_millis() as u64,
                    error = %failure,
                    "lookup attempt failed"
                );
            }

            if !self.policy.should_retry(attempt, &failure) {
                break failure;
            }

            attempt += 1;
            let delay = self.policy.delay_before(attempt, &failure);
            debug!(
                phone = %id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying lookup"
            );
            if !sleep_or_cancel(delay, &ctx.cancellation_token()).await {
                info!(phone = %id, "run cancelled during backoff");
                ctx.stats().record_failure();
                return LookupOutcome::Failed(LookupFailure::Cancelled);
            }
            ctx.stats().record_retry();
        };

        error!(
            phone = %id,
            attempts = attempt + 1,
            error = %last_failure,
            "all lookup attempts failed"
        );
        let outcome = LookupOutcome::Failed(last_failure);
        ctx.cache().put(id.clone(), outcome.clone());
        ctx.stats().record_failure();
        outcome
    }

    async fn attempt(&self, id: &CanonicalIdentifier, attempt: u32) -> AttemptRecord {
        let start = Instant::now();
        let result = match self.transport.call(id, self.timeout).await {
            Ok(response) => classify_response(response),
            Err(e) => Err(classify_transport_error(e)),
        };
        AttemptRecord {
            attempt,
            elapsed: start.elapsed(),
            result,
        }
    }
}

/// Count a cached outcome towards this run's success/failure totals.
fn record_terminal(ctx: &RunContext, outcome: &LookupOutcome) {
    if outcome.is_success() {
        ctx.stats().record_success();
    } else {
        ctx.stats().record_failure();
    }
}

/// Map a raw HTTP response onto a payload or a failure reason.
///
/// Only 200 is success. A 200 whose body does not match the contract is an
/// unexpected error and is not retried.
pub fn classify_response(response: RawResponse) -> Result<CourierReport, LookupFailure> {
    match response.status {
        200 => CourierReport::from_body(&response.body).map_err(|e| LookupFailure::Unexpected {
            message: e.to_string(),
        }),
        429 => Err(LookupFailure::RateLimited),
        code => Err(LookupFailure::HttpStatus {
            code,
            body: response.body.chars().take(ERROR_BODY_LIMIT).collect(),
        }),
    }
}

pub fn classify_transport_error(err: TransportError) -> LookupFailure {
    match err {
        TransportError::Timeout { .. } => LookupFailure::Timeout,
        TransportError::Http(message) => LookupFailure::Transport { message },
        TransportError::Other(message) => LookupFailure::Unexpected { message },
    }
}
