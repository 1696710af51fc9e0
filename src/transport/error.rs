//! Error types for outbound API calls.

use thiserror::Error;

/// Error type for a single HTTP exchange.
///
/// Describes what went wrong at the transport level without dictating
/// recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// Includes DNS resolution failures, connection refused, TLS
    /// handshake failures and reset connections.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The provided URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The underlying client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

/// Outcome of one attempt that did not produce a usable response.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The request never produced a response.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", body.as_ref().map(|b| format!(": {b}")).unwrap_or_default())]
    NonSuccessStatus {
        /// Status code returned by the server.
        status: http::StatusCode,
        /// Response body, when it was valid UTF-8.
        body: Option<String>,
    },
}

/// Error returned by an [`ApiTransport`](super::ApiTransport) call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The call failed with an error that is not worth retrying.
    #[error("Request rejected: {0}")]
    Rejected(#[source] AttemptError),

    /// Every attempt failed with a retryable error.
    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last_error: AttemptError,
    },
}

impl CallError {
    /// Returns the HTTP status of the final attempt, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        let (Self::Rejected(err) | Self::MaxRetriesExceeded { last_error: err, .. }) = self;
        match err {
            AttemptError::NonSuccessStatus { status, .. } => Some(*status),
            AttemptError::Http(_) => None,
        }
    }
}
