//! parcelcheck-core: the bulk courier-history verification engine.
//!
//! # Overview
//!
//! Takes a list of raw phone-number tokens, normalizes and de-duplicates
//! them, and resolves each against a remote courier-history service under
//! a bounded-parallelism, rate-aware, retrying pipeline. The crate defines:
//!
//! - [`CanonicalIdentifier`] / [`Normalizer`]: input normalization
//! - [`LookupTransport`]: the async trait the HTTP client implements
//! - [`LookupOutcome`] / [`LookupFailure`]: per-identifier terminal results
//! - [`policy`] module: retry backoff, pacing jitter, token bucket
//! - [`ResultCache`] and [`RunStatistics`], owned by a [`RunContext`]
//! - [`pipeline`] module: resolver, worker pool, batch scheduler, [`Verifier`]
//! - [`VerificationReport`]: the hand-off to presentation layers

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod identifier;
pub mod input;
pub mod outcome;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cache::{CacheConfig, ResultCache};
pub use config::CheckerConfig;
pub use context::RunContext;
pub use error::{ConfigError, InputError, TransportError};
pub use identifier::{dedup, normalize, CanonicalIdentifier, Deduplicated, Normalizer};
pub use input::{read_upload, PreparedInput};
pub use outcome::{CourierReport, CourierStats, LookupFailure, LookupOutcome, PayloadError};
pub use pipeline::{PipelineConfig, Verifier};
pub use report::{
    CourierRow, IdentifierSummary, InvalidToken, LookupResult, RowFlag, SummaryStatus,
    VerificationReport,
};
pub use stats::{RunStatistics, StatsSnapshot};
pub use transport::{LookupTransport, RawResponse};
