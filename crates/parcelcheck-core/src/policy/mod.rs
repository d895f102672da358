//! Policy engine: how hard, how fast and how often to hit the lookup service.
//!
//! ```text
//! Worker → [Pacing] → [RateLimiter] → [Transport]
//!             ↑                            │
//!             └──── [RetryPolicy] ◄────────┘
//! ```

pub mod pacing;
pub mod rate_limiter;
pub mod retry;

pub use pacing::{JitterRange, PacingConfig};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, TokenBucket};
pub use retry::{RetryConfig, RetryPolicy};
