//! Queue client error types.

use std::time::Duration;

use jobline_core::error::{LeaseError, SinkError};

/// Error type for queue service calls.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The queue service returned a non-2xx status code.
    #[error("Queue service error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The call did not finish within its timeout and was abandoned.
    #[error("Queue call timed out after {0:?}")]
    Timeout(Duration),

    /// The response body was not the expected JSON.
    #[error("Malformed queue response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<QueueError> for LeaseError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Timeout(after) => LeaseError::Timeout(after),
            QueueError::Status { status, body } => LeaseError::Rejected { status, body },
            other => LeaseError::Transport(other.to_string()),
        }
    }
}

impl From<QueueError> for SinkError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Timeout(after) => SinkError::Timeout(after),
            QueueError::Status { status, body } => SinkError::Rejected { status, body },
            other => SinkError::Transport(other.to_string()),
        }
    }
}
