//! Lookup pipeline: per-identifier resolution, per-batch worker pool and the
//! sequential batch scheduler, tied together by [`Verifier`].

pub mod pool;
pub mod resolver;
pub mod scheduler;

pub use pool::{BatchResult, WorkerPool};
pub use resolver::{classify_response, classify_transport_error, Resolver};
pub use scheduler::{batch_count, BatchScheduler};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::CheckerConfig;
use crate::context::RunContext;
use crate::error::InputError;
use crate::identifier::{CanonicalIdentifier, Normalizer};
use crate::input::{read_upload, PreparedInput, DEFAULT_MAX_INPUT_BYTES};
use crate::outcome::LookupFailure;
use crate::policy::{PacingConfig, RetryConfig, RetryPolicy};
use crate::report::{InvalidToken, LookupResult, VerificationReport};
use crate::transport::LookupTransport;

/// Tuning for one [`Verifier`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_workers: usize,
    pub batch_size: usize,
    pub request_timeout: Duration,
    pub max_input_bytes: usize,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            batch_size: 30,
            request_timeout: Duration::from_secs(20),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            retry: RetryConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// No pacing and no backoff waits; keeps the retry ceiling.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            retry: RetryConfig::immediate(max_retries),
            pacing: PacingConfig::none(),
            ..Default::default()
        }
    }
}

/// End-to-end engine: raw tokens in, [`VerificationReport`] out.
///
/// A `Verifier` holds no per-run state; everything mutable lives in the
/// [`RunContext`] passed to each call.
pub struct Verifier {
    resolver: Arc<Resolver>,
    scheduler: BatchScheduler,
    normalizer: Normalizer,
    max_input_bytes: usize,
}

impl Verifier {
    pub fn new(transport: Arc<dyn LookupTransport>, config: PipelineConfig) -> Self {
        let resolver = Arc::new(Resolver::new(
            transport,
            RetryPolicy::new(config.retry),
            config.request_timeout,
        ));
        let pool = WorkerPool::new(config.max_workers, config.pacing);
        Self {
            resolver,
            scheduler: BatchScheduler::new(config.batch_size, config.pacing.batch_pause, pool),
            normalizer: Normalizer::default(),
            max_input_bytes: config.max_input_bytes,
        }
    }

    pub fn from_config(transport: Arc<dyn LookupTransport>, config: &CheckerConfig) -> Self {
        Self::new(transport, config.pipeline_config())
    }

    /// Verify an uploaded text file, one number per line.
    pub async fn verify_upload(
        &self,
        bytes: &[u8],
        ctx: &RunContext,
    ) -> Result<VerificationReport, InputError> {
        let tokens = read_upload(bytes, self.max_input_bytes)?;
        self.verify_tokens(&tokens, ctx).await
    }

    /// Normalize, de-duplicate and look up `tokens`.
    ///
    /// Fails only on input problems, before any network activity. Lookup
    /// failures are reported per identifier inside the report.
    pub async fn verify_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
        ctx: &RunContext,
    ) -> Result<VerificationReport, InputError> {
        let started = Instant::now();
        ctx.begin_run();

        let prepared = PreparedInput::prepare(tokens, &self.normalizer)?;
        info!(
            received = prepared.raw_count,
            unique = prepared.unique.len(),
            invalid = prepared.invalid.len(),
            duplicates_removed = prepared.duplicates_removed,
            "input prepared"
        );

        let mut report = self.verify_identifiers(&prepared.unique, ctx).await;
        report.invalid = prepared.invalid.into_iter().map(InvalidToken::new).collect();
        report.duplicates_removed = prepared.duplicates_removed;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Look up already-canonical identifiers. The caller is responsible for
    /// de-duplication and for [`RunContext::begin_run`]; counters accumulate
    /// onto whatever the context already holds.
    pub async fn verify_identifiers(
        &self,
        ids: &[CanonicalIdentifier],
        ctx: &RunContext,
    ) -> VerificationReport {
        let started = Instant::now();
        if ctx.is_cancelled() {
            warn!(
                identifiers = ids.len(),
                "run context already cancelled, nothing will be looked up"
            );
        }
        ctx.stats().add_total(ids.len() as u64);
        info!(
            endpoint = self.resolver.endpoint(),
            identifiers = ids.len(),
            batches = batch_count(ids.len(), self.scheduler.batch_size()),
            "starting run"
        );

        let outcomes = self.scheduler.run(ids, &self.resolver, ctx).await;
        let stats = ctx.finish_run();
        let elapsed = started.elapsed();
        let cancelled = outcomes
            .iter()
            .any(|(_, o)| o.failure() == Some(&LookupFailure::Cancelled));

        info!(
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            retries = stats.retries,
            cache_hits = stats.cache_hits,
            inconsistent_payloads = stats.inconsistent_payloads,
            success_rate = %format!("{:.1}%", stats.success_rate()),
            elapsed_ms = elapsed.as_millis() as u64,
            cancelled,
            "run finished"
        );

        VerificationReport {
            results: outcomes
                .into_iter()
                .map(|(phone, outcome)| LookupResult { phone, outcome })
                .collect(),
            invalid: Vec::new(),
            duplicates_removed: 0,
            stats,
            elapsed_ms: elapsed.as_millis() as u64,
            cancelled,
        }
    }
}
