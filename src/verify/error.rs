//! Error type for nameserver queries.

use std::net::IpAddr;

use thiserror::Error;

/// A direct nameserver query that produced no usable answer
/// (timeout, refusal, SERVFAIL, network error).
#[derive(Debug, Error)]
#[error("Query to {server} failed: {message}")]
pub struct LookupError {
    /// Address of the queried server.
    pub server: IpAddr,
    /// Resolver error text.
    pub message: String,
}
