//! Exponential backoff retry policy with jitter.
//!
//! Two backoff curves are used depending on the last failure:
//! - rate limited (429): `base * 3^(attempt-1) + U(1s, 3s)`
//! - anything else retryable: `base * factor^attempt + U(0.1s, 0.5s)`
//!
//! `attempt` is always the index of the attempt about to be made (the first
//! attempt is 0, the first retry is 1).

use std::time::Duration;

use super::pacing::JitterRange;
use crate::outcome::LookupFailure;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Base delay both backoff curves are scaled from.
    pub base_delay: Duration,
    /// Multiplier for the standard curve.
    pub backoff_factor: f64,
    /// Multiplier for the rate-limit curve.
    pub rate_limit_factor: f64,
    /// Caps the exponential part of either curve (jitter is added on top).
    pub max_backoff: Duration,
    /// Jitter added to the standard curve.
    pub jitter: JitterRange,
    /// Jitter added to the rate-limit curve.
    pub rate_limit_jitter: JitterRange,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
            backoff_factor: 2.0,
            rate_limit_factor: 3.0,
            max_backoff: Duration::from_secs(120),
            jitter: JitterRange::from_secs_f64(0.1, 0.5),
            rate_limit_jitter: JitterRange::from_secs_f64(1.0, 3.0),
        }
    }
}

impl RetryConfig {
    /// Same attempt ceiling, but every wait is zero.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            jitter: JitterRange::ZERO,
            rate_limit_jitter: JitterRange::ZERO,
            ..Default::default()
        }
    }
}

/// Stateless retry policy. Decides whether and when to try again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempts allowed for one identifier.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries + 1
    }

    /// Whether attempt `attempt` (0-based), which ended in `failure`, should
    /// be followed by another one.
    ///
    /// Non-transient failures never retry. Transient ones (including 429,
    /// whatever happened on earlier attempts) retry while attempts remain.
    pub fn should_retry(&self, attempt: u32, failure: &LookupFailure) -> bool {
        failure.is_retryable() && attempt < self.config.max_retries
    }

    /// Delay before attempt `attempt` (1-based retry index), given the
    /// failure of the previous attempt. Includes jitter.
    pub fn delay_before(&self, attempt: u32, failure: &LookupFailure) -> Duration {
        let jitter = if failure.is_rate_limited() {
            self.config.rate_limit_jitter
        } else {
            self.config.jitter
        };
        self.backoff(attempt, failure) + jitter.sample()
    }

    /// The deterministic part of [`delay_before`](Self::delay_before).
    pub fn backoff(&self, attempt: u32, failure: &LookupFailure) -> Duration {
        let (factor, exponent) = if failure.is_rate_limited() {
            (self.config.rate_limit_factor, attempt.saturating_sub(1))
        } else {
            (self.config.backoff_factor, attempt)
        };
        let nanos = self.config.base_delay.as_nanos() as f64 * factor.powi(exponent as i32);
        let cap = self.config.max_backoff.as_nanos() as f64;
        Duration::from_nanos(nanos.min(cap) as u64)
    }
}
