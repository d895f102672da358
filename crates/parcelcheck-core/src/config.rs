//! Checker configuration.
//!
//! Loaded from YAML, then overridden by environment variables and finally by
//! command-line flags. Every field has a default, so an empty file is valid
//! apart from the API key.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::ConfigError;
use crate::input::DEFAULT_MAX_INPUT_BYTES;
use crate::pipeline::PipelineConfig;
use crate::policy::{JitterRange, PacingConfig, RateLimiterConfig, RetryConfig};

pub const ENV_API_KEY: &str = "PARCELCHECK_API_KEY";
/// Fallback key variable, read only when [`ENV_API_KEY`] is unset.
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_API_URL: &str = "PARCELCHECK_API_URL";

pub const DEFAULT_API_URL: &str = "https://bdcourier.com/api/pro/courier-check";

/// Inclusive millisecond range for a randomized pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMs {
    pub min: u64,
    pub max: u64,
}

impl RangeMs {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn jitter(&self) -> JitterRange {
        JitterRange::from_millis(self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Lookup endpoint; the identifier is appended as `?phone=`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token. Usually supplied through the environment.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Client-side ceiling on outbound requests; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests_per_second: Option<f64>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
    #[serde(default = "default_submit_stagger")]
    pub submit_stagger: RangeMs,
    #[serde(default = "default_completion_pause")]
    pub completion_pause: RangeMs,
    #[serde(default = "default_batch_pause")]
    pub batch_pause: RangeMs,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }
fn default_request_timeout_secs() -> u64 { 20 }
fn default_max_workers() -> usize { 8 }
fn default_batch_size() -> usize { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 300 }
fn default_backoff_factor() -> f64 { 2.0 }
fn default_cache_capacity() -> usize { 10_000 }
fn default_max_input_bytes() -> usize { DEFAULT_MAX_INPUT_BYTES }
fn default_submit_stagger() -> RangeMs { RangeMs::new(100, 300) }
fn default_completion_pause() -> RangeMs { RangeMs::new(50, 150) }
fn default_batch_pause() -> RangeMs { RangeMs::new(2_000, 5_000) }

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_workers: default_max_workers(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_requests_per_second: None,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: None,
            max_input_bytes: default_max_input_bytes(),
            submit_stagger: default_submit_stagger(),
            completion_pause: default_completion_pause(),
            batch_pause: default_batch_pause(),
        }
    }
}

impl CheckerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` as the environment. Empty values are
    /// treated as unset.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_API_KEY_FALLBACK)) {
            self.api_key = key;
        }
        if let Some(url) = get(ENV_API_URL) {
            self.api_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.api_url.trim().is_empty() {
            return invalid("api_url must not be empty".into());
        }
        if self.api_key.trim().is_empty() {
            return invalid(format!(
                "api_key is not set (use the config file, {ENV_API_KEY} or {ENV_API_KEY_FALLBACK})"
            ));
        }
        if self.max_workers == 0 {
            return invalid("max_workers must be at least 1".into());
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        if self.request_timeout_secs == 0 {
            return invalid("request_timeout_secs must be at least 1".into());
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return invalid(format!("backoff_factor must be >= 1.0, got {}", self.backoff_factor));
        }
        if let Some(rps) = self.max_requests_per_second {
            if !(rps.is_finite() && rps > 0.0) {
                return invalid(format!("max_requests_per_second must be positive, got {rps}"));
            }
        }
        if self.max_input_bytes == 0 {
            return invalid("max_input_bytes must be positive".into());
        }
        for (name, range) in [
            ("submit_stagger", self.submit_stagger),
            ("completion_pause", self.completion_pause),
            ("batch_pause", self.batch_pause),
        ] {
            if range.min > range.max {
                return invalid(format!("{name}: min {} exceeds max {}", range.min, range.max));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            ..Default::default()
        }
    }

    pub fn pacing_config(&self) -> PacingConfig {
        PacingConfig {
            submit_stagger: self.submit_stagger.jitter(),
            completion_pause: self.completion_pause.jitter(),
            batch_pause: self.batch_pause.jitter(),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: self.cache_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn rate_limiter_config(&self) -> Option<RateLimiterConfig> {
        self.max_requests_per_second.map(RateLimiterConfig::per_second)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_workers: self.max_workers,
            batch_size: self.batch_size,
            request_timeout: self.request_timeout(),
            max_input_bytes: self.max_input_bytes,
            retry: self.retry_config(),
            pacing: self.pacing_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = CheckerConfig::from_yaml_str("").unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.batch_size, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.max_input_bytes, 5 * 1024 * 1024);
        assert_eq!(config.batch_pause, RangeMs::new(2_000, 5_000));
        assert!(config.rate_limiter_config().is_none());
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let config = CheckerConfig::from_yaml_str(
            r#"
api_url: http://localhost:9000/check
api_key: secret
batch_size: 10
max_requests_per_second: 4
cache_ttl_secs: 600
batch_pause: { min: 0, max: 0 }
"#,
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9000/check");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.cache_config().ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.rate_limiter_config().unwrap().refill_rate, 4.0);
        assert!(config.pacing_config().batch_pause.is_zero());
        config.validate().unwrap();
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            CheckerConfig::from_yaml_str("batch_size: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = CheckerConfig {
            api_key: "from-file".into(),
            ..Default::default()
        };
        config.apply_env_from(env(&[(ENV_API_KEY_FALLBACK, "fallback")]));
        assert_eq!(config.api_key, "fallback");

        config.apply_env_from(env(&[
            (ENV_API_KEY, "primary"),
            (ENV_API_KEY_FALLBACK, "fallback"),
            (ENV_API_URL, "http://mock/check"),
        ]));
        assert_eq!(config.api_key, "primary");
        assert_eq!(config.api_url, "http://mock/check");

        config.apply_env_from(env(&[(ENV_API_KEY, "  ")]));
        assert_eq!(config.api_key, "primary");
    }

    #[test]
    fn validation_rules() {
        let valid = CheckerConfig {
            api_key: "k".into(),
            ..Default::default()
        };
        valid.validate().unwrap();

        let cases = [
            CheckerConfig { api_key: String::new(), ..valid.clone() },
            CheckerConfig { api_url: " ".into(), ..valid.clone() },
            CheckerConfig { max_workers: 0, ..valid.clone() },
            CheckerConfig { batch_size: 0, ..valid.clone() },
            CheckerConfig { backoff_factor: 0.5, ..valid.clone() },
            CheckerConfig { max_requests_per_second: Some(0.0), ..valid.clone() },
            CheckerConfig { submit_stagger: RangeMs::new(300, 100), ..valid.clone() },
        ];
        for case in cases {
            assert!(matches!(case.validate(), Err(ConfigError::Invalid(_))), "{case:?}");
        }
    }

    #[test]
    fn conversions_carry_values() {
        let config = CheckerConfig {
            api_key: "k".into(),
            max_retries: 5,
            base_delay_ms: 100,
            ..Default::default()
        };
        let retry = config.retry_config();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(100));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_workers, 8);
        assert_eq!(pipeline.batch_size, 30);
        assert_eq!(pipeline.pacing.submit_stagger, JitterRange::from_millis(100, 300));
    }
}
