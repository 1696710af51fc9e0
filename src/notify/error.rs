//! Error types for downstream notification.

use thiserror::Error;

use crate::transport::HttpError;

/// Error raised while updating downstream resources.
///
/// Never leaves the notifier: every failure is logged inside it.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The API server could not be reached.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The API server rejected a request.
    #[error("{operation} returned HTTP {status}")]
    Status {
        /// What was being attempted.
        operation: String,
        /// Status code returned.
        status: http::StatusCode,
    },

    /// A response body could not be understood.
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    /// In-cluster credentials are missing or unusable.
    #[error("In-cluster configuration unavailable: {0}")]
    InCluster(String),
}
