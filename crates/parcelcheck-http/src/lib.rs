//! parcelcheck-http: HTTP implementation of [`LookupTransport`].
//!
//! [`LookupTransport`]: parcelcheck_core::LookupTransport

pub mod client;

pub use client::{HttpClientConfig, HttpLookupClient, USER_AGENT};
