//! Randomized pacing delays and cancellable waits.
//!
//! Three pauses smooth the outbound request rate:
//! - `submit_stagger`:   between successive submissions within a batch
//! - `completion_pause`: after each completed lookup is collected
//! - `batch_pause`:      before every batch except the first

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// A uniform random delay in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl JitterRange {
    pub const ZERO: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn from_secs_f64(min: f64, max: f64) -> Self {
        Self::new(Duration::from_secs_f64(min), Duration::from_secs_f64(max))
    }

    /// Draw a delay. Degenerate ranges (`max <= min`) always yield `min`.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs).clamp(self.min, self.max)
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }
}

/// Pacing delays applied by the worker pool and batch scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub submit_stagger: JitterRange,
    pub completion_pause: JitterRange,
    pub batch_pause: JitterRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            submit_stagger: JitterRange::from_millis(100, 300),
            completion_pause: JitterRange::from_millis(50, 150),
            batch_pause: JitterRange::from_millis(2_000, 5_000),
        }
    }
}

impl PacingConfig {
    /// No pacing at all. Useful for tests and local mocks.
    pub fn none() -> Self {
        Self {
            submit_stagger: JitterRange::ZERO,
            completion_pause: JitterRange::ZERO,
            batch_pause: JitterRange::ZERO,
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `true` if the full delay elapsed, `false` if cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_stays_in_range() {
        let r = JitterRange::from_millis(100, 300);
        for _ in 0..200 {
            let d = r.sample();
            assert!(d >= r.min && d <= r.max, "{d:?} outside {r:?}");
        }
    }

    #[test]
    fn degenerate_range_is_constant() {
        assert_eq!(JitterRange::ZERO.sample(), Duration::ZERO);
        let r = JitterRange::from_millis(500, 100);
        assert_eq!(r.sample(), Duration::from_millis(500));
    }

    #[test]
    fn batch_pause_exceeds_stagger() {
        let p = PacingConfig::default();
        assert!(p.batch_pause.min > p.submit_stagger.max);
    }

    #[tokio::test]
    async fn cancel_interrupts_sleep() {
        let token = CancellationToken::new();
        token.cancel();
        let start = std::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(30), &token).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn uncancelled_sleep_completes() {
        let token = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_millis(5), &token).await);
        assert!(sleep_or_cancel(Duration::ZERO, &token).await);
    }
}
