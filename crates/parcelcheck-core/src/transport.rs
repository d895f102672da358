//! The `LookupTransport` trait: the seam between the pipeline and the
//! remote courier-check service.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::identifier::CanonicalIdentifier;

/// Raw HTTP result of one lookup call: status code plus body text.
///
/// The transport does not interpret the status; classification into success,
/// rate limiting or server error belongs to the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A single outbound lookup per call. No retries, no caching.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every worker of a batch as `Arc<dyn LookupTransport>`.
#[async_trait]
pub trait LookupTransport: Send + Sync + 'static {
    /// Perform one lookup for `id`, giving up after `timeout`.
    async fn call(
        &self,
        id: &CanonicalIdentifier,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;

    /// The transport's identifier (endpoint URL or name), for logging.
    fn url(&self) -> &str;
}
