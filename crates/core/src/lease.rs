//! The leasing and event-reporting seams the worker loop depends on.
//!
//! Both deployments (direct job table, HTTP queue service) implement
//! [`JobLease`] and [`EventSink`]; the loop never knows which one it has.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LeaseError, SinkError};
use crate::event::{EventAck, LifecycleEvent};
use crate::job::{Job, JobStatus};

/// Who is asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub worker_id: String,
    /// Job types (or tags) this worker can run. Empty means "anything".
    pub capabilities: Vec<String>,
    /// How many jobs the queue may reserve ahead for this worker.
    pub prefetch: u32,
}

impl WorkerIdentity {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            capabilities: Vec::new(),
            prefetch: 1,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_prefetch(mut self, prefetch: u32) -> Self {
        self.prefetch = prefetch;
        self
    }
}

/// Result of one claim attempt: a job, or nothing plus an optional
/// advisory backoff from the lease backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claim {
    pub job: Option<Job>,
    pub backoff: Option<Duration>,
}

impl Claim {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn leased(job: Job) -> Self {
        Self {
            job: Some(job),
            backoff: None,
        }
    }

    pub fn idle(backoff: Option<Duration>) -> Self {
        Self { job: None, backoff }
    }
}

/// Exclusive, time-bounded ownership of pending jobs.
///
/// For any two concurrent callers at most one receives a given job. That
/// guarantee belongs to the implementation's backing store.
#[async_trait]
pub trait JobLease: Send + Sync {
    /// Claim the oldest pending job, if any.
    async fn claim(&self, worker: &WorkerIdentity) -> Result<Claim, LeaseError>;

    /// Refresh the lease while the job runs. Backends that track liveness
    /// through heartbeat events alone keep the default.
    async fn heartbeat(&self, _job: &Job, _worker_id: &str) -> Result<(), LeaseError> {
        Ok(())
    }

    /// Record the terminal status of a job this worker holds. Backends that
    /// derive status from terminal events keep the default.
    async fn release(
        &self,
        _job: &Job,
        _worker_id: &str,
        _outcome: JobStatus,
    ) -> Result<(), LeaseError> {
        Ok(())
    }
}

/// Append-only lifecycle event log, deduplicated by idempotency key.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn report(&self, event: &LifecycleEvent) -> Result<EventAck, SinkError>;
}
