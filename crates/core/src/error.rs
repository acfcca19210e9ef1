use std::time::Duration;

use crate::types::JobId;

/// Failure to obtain, refresh, or release a job lease.
///
/// "No job available" is never an error; it is an empty [`Claim`](crate::lease::Claim).
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("Lease transport failed: {0}")]
    Transport(String),

    #[error("Lease request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lease service rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Lease backend unavailable: {0}")]
    Unavailable(String),

    #[error("Job {job_id} is not held by worker {worker_id}")]
    NotHeld { job_id: JobId, worker_id: String },
}

/// Failure to deliver a lifecycle event to the event log.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Event transport failed: {0}")]
    Transport(String),

    #[error("Event report timed out after {0:?}")]
    Timeout(Duration),

    #[error("Event sink rejected event ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Event sink unavailable: {0}")]
    Unavailable(String),
}

/// Failure of the outbound notification collaborator.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("No notification channel configured for namespace '{0}'")]
    NotConfigured(String),
}
