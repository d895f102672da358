//! Lookup client backed by `reqwest`.
//!
//! One call is one `POST {api_url}?phone={id}` with bearer authentication.
//! The client never retries and never interprets the status code; both are
//! the pipeline's job. An optional token bucket caps the aggregate request
//! rate across every worker sharing the client.

use std::time::Duration;

use async_trait::async_trait;

use parcelcheck_core::config::CheckerConfig;
use parcelcheck_core::error::TransportError;
use parcelcheck_core::identifier::CanonicalIdentifier;
use parcelcheck_core::policy::{RateLimiter, RateLimiterConfig};
use parcelcheck_core::transport::{LookupTransport, RawResponse};

/// `User-Agent` sent with every lookup.
pub const USER_AGENT: &str = concat!("parcelcheck/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`HttpLookupClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub user_agent: String,
    /// Unlimited when `None`.
    pub rate_limiter: Option<RateLimiterConfig>,
}

impl HttpClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            user_agent: USER_AGENT.to_string(),
            rate_limiter: None,
        }
    }

    pub fn from_checker(config: &CheckerConfig) -> Self {
        Self {
            rate_limiter: config.rate_limiter_config(),
            ..Self::new(config.api_url.clone(), config.api_key.clone())
        }
    }
}

/// HTTP lookup client. Cheap to share behind an `Arc`.
pub struct HttpLookupClient {
    url: String,
    api_key: String,
    http: reqwest::Client,
    rate_limiter: Option<RateLimiter>,
}

impl HttpLookupClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: config.api_url,
            api_key: config.api_key,
            http,
            rate_limiter: config.rate_limiter.map(RateLimiter::new),
        })
    }

    pub fn from_checker(config: &CheckerConfig) -> Result<Self, TransportError> {
        Self::new(HttpClientConfig::from_checker(config))
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            ms: timeout.as_millis() as u64,
        }
    } else {
        TransportError::Http(err.to_string())
    }
}

#[async_trait]
impl LookupTransport for HttpLookupClient {
    async fn call(
        &self,
        id: &CanonicalIdentifier,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let resp = self
            .http
            .post(&self.url)
            .query(&[("phone", id.as_str())])
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| map_reqwest_error(e, timeout))?;
        tracing::trace!(phone = %id, status, bytes = body.len(), "lookup response");

        Ok(RawResponse { status, body })
    }

    fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for HttpLookupClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLookupClient")
            .field("url", &self.url)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("parcelcheck/"));
        assert_eq!(
            USER_AGENT.trim_start_matches("parcelcheck/"),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn config_from_checker() {
        let checker = CheckerConfig {
            api_url: "http://localhost/check".into(),
            api_key: "secret".into(),
            max_requests_per_second: Some(2.0),
            ..Default::default()
        };
        let config = HttpClientConfig::from_checker(&checker);
        assert_eq!(config.api_url, "http://localhost/check");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.rate_limiter.as_ref().unwrap().refill_rate, 2.0);

        let client = HttpLookupClient::new(config.clone()).unwrap();
        assert_eq!(client.url(), "http://localhost/check");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
