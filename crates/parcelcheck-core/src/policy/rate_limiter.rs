//! Token bucket rate limiter for outbound lookups.
//!
//! Tokens accrue at `refill_rate` tokens/second up to `capacity`. Each lookup
//! consumes one token. One bucket is shared by every worker of a client, so
//! it bounds the aggregate request rate regardless of pool size.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens in the bucket (burst size).
    pub capacity: f64,
    /// Token refill rate (tokens per second).
    pub refill_rate: f64,
}

impl RateLimiterConfig {
    /// A bucket that allows `rps` requests per second with a burst of `rps`.
    pub fn per_second(rps: f64) -> Self {
        Self {
            capacity: rps.max(1.0),
            refill_rate: rps,
        }
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(5.0)
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
pub struct TokenBucket {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Try to take `cost` tokens. On failure returns how long until they
    /// would be available.
    pub fn try_acquire(&self, cost: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= cost {
            state.tokens -= cost;
            return Ok(());
        }
        let deficit = cost - state.tokens;
        if self.config.refill_rate <= 0.0 {
            return Err(Duration::MAX);
        }
        Err(Duration::from_secs_f64(deficit / self.config.refill_rate))
    }

    /// Currently available tokens.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_rate).min(self.config.capacity);
        state.last_refill = now;
    }
}

/// Async front end for [`TokenBucket`]: waits until a token is free.
pub struct RateLimiter {
    bucket: TokenBucket,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config),
        }
    }

    /// Take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.bucket.try_acquire(1.0).is_ok()
    }

    /// Take one token, sleeping as long as needed. The bucket lock is never
    /// held across the sleep.
    pub async fn acquire(&self) {
        while let Err(wait) = self.bucket.try_acquire(1.0) {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limited, backing off");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn available(&self) -> f64 {
        self.bucket.available()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("available", &self.available())
            .finish()
    }
}
