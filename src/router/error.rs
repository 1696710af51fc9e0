//! Error types for router queries.

use thiserror::Error;

use crate::transport::CallError;

/// Error returned when the router's interface listing cannot be obtained.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The API call failed after the transport's retry budget.
    #[error("Router API call failed: {0}")]
    Call(#[from] CallError),

    /// The router answered with something other than an interface listing.
    #[error("Malformed router response: {0}")]
    MalformedResponse(String),

    /// The configured base URL cannot be turned into an endpoint URL.
    #[error("Invalid router URL: {0}")]
    InvalidUrl(String),
}
