//! Error types for the transport, input and configuration layers.
//!
//! Per-identifier lookup failures are not errors in this sense; they are
//! carried as [`LookupFailure`](crate::outcome::LookupFailure) values inside a
//! [`LookupOutcome`](crate::outcome::LookupOutcome) and never abort a run.

use thiserror::Error;

/// Errors that can occur while performing a single outbound lookup call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Connection refused, DNS failure, TLS failure, broken body, etc.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Anything outside the anticipated network taxonomy.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Http(_))
    }
}

/// Run-aborting problems with the uploaded input. Raised before any network
/// activity takes place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("No phone numbers found in the input")]
    Empty,

    #[error("Input too large: {size} bytes (maximum is {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid input encoding, expected UTF-8 text")]
    InvalidEncoding,

    #[error("No valid phone numbers found ({invalid} rejected)")]
    NoValidNumbers { invalid: usize },
}

/// Configuration loading / validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_retryability() {
        assert!(TransportError::Timeout { ms: 20_000 }.is_retryable());
        assert!(TransportError::Http("connection reset".into()).is_retryable());
        assert!(!TransportError::Other("boom".into()).is_retryable());
    }

    #[test]
    fn input_error_messages() {
        let e = InputError::TooLarge { size: 10, max: 5 };
        assert_eq!(e.to_string(), "Input too large: 10 bytes (maximum is 5 bytes)");
        assert_eq!(
            InputError::NoValidNumbers { invalid: 3 }.to_string(),
            "No valid phone numbers found (3 rejected)"
        );
    }
}
