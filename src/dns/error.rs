//! Error types for DNS provider operations.

use thiserror::Error;

use crate::transport::{CallError, HttpError};

/// Error returned by a [`DnsZone`](super::DnsZone) operation.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The API call failed after the transport's retry budget, or was
    /// rejected by the provider.
    #[error("DNS API call failed: {0}")]
    Call(#[from] CallError),

    /// The configured zone does not exist in the account.
    #[error("Zone '{0}' not found")]
    ZoneNotFound(String),

    /// The provider answered with a body that could not be understood.
    #[error("Malformed DNS API response: {0}")]
    MalformedResponse(String),

    /// A request URL could not be built.
    #[error("Invalid DNS API URL: {0}")]
    InvalidUrl(String),

    /// The request could not be prepared (for example, an unusable token).
    #[error("Invalid DNS API request: {0}")]
    Request(#[source] HttpError),
}
