//! [`JobLease`] and [`EventSink`] over PostgreSQL.
//!
//! Claims fail open: any data-access error is logged and surfaces as "no
//! work", so a flaky database slows the worker down instead of killing it.
//! A store built without a database logs that once and stays idle.
//!
//! Every call is bounded by the store timeout, so a stalled connection or a
//! blocked row lock cannot wedge the worker loop or its heartbeat task.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use jobline_core::error::{LeaseError, SinkError};
use jobline_core::event::{EventAck, LifecycleEvent};
use jobline_core::job::{Job, JobStatus};
use jobline_core::lease::{Claim, EventSink, JobLease, WorkerIdentity};

use crate::repositories::{EventRepo, JobRepo};
use crate::DbPool;

/// Upper bound on a single store call unless configured otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Direct-store lease backend.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: Option<DbPool>,
    timeout: Duration,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool: Some(pool),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A store with no database behind it. Every claim is empty and every
    /// event report fails with [`SinkError::Unavailable`].
    pub fn unconfigured() -> Self {
        tracing::error!("Job store has no database configured; workers will never receive jobs");
        Self {
            pool: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> Option<&DbPool> {
        self.pool.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Why a bounded store call produced no result.
#[derive(Debug)]
enum StoreCallError {
    Timeout(Duration),
    Db(sqlx::Error),
}

impl std::fmt::Display for StoreCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(limit) => write!(f, "store call timed out after {limit:?}"),
            Self::Db(e) => e.fmt(f),
        }
    }
}

impl From<StoreCallError> for LeaseError {
    fn from(e: StoreCallError) -> Self {
        match e {
            StoreCallError::Timeout(limit) => Self::Timeout(limit),
            StoreCallError::Db(e) => Self::Transport(e.to_string()),
        }
    }
}

impl From<StoreCallError> for SinkError {
    fn from(e: StoreCallError) -> Self {
        match e {
            StoreCallError::Timeout(limit) => Self::Timeout(limit),
            StoreCallError::Db(e) => Self::Transport(e.to_string()),
        }
    }
}

/// Await `fut`, giving up after `limit`. Dropping the future on expiry
/// returns its connection to the pool.
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreCallError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreCallError::Db),
        Err(_) => Err(StoreCallError::Timeout(limit)),
    }
}

#[async_trait]
impl JobLease for PgJobStore {
    async fn claim(&self, worker: &WorkerIdentity) -> Result<Claim, LeaseError> {
        let Some(pool) = &self.pool else {
            return Ok(Claim::empty());
        };

        match bounded(self.timeout, JobRepo::claim_next(pool, &worker.worker_id)).await {
            Ok(Some(row)) => match row.into_job() {
                Ok(job) => {
                    tracing::debug!(job_id = %job.id, worker_id = %worker.worker_id, "Job claimed");
                    Ok(Claim::leased(job))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Claimed job row could not be decoded");
                    Ok(Claim::empty())
                }
            },
            Ok(None) => Ok(Claim::empty()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    worker_id = %worker.worker_id,
                    "Job claim query failed"
                );
                Ok(Claim::empty())
            }
        }
    }

    async fn heartbeat(&self, job: &Job, worker_id: &str) -> Result<(), LeaseError> {
        let pool = self.require_pool()?;
        let held = bounded(self.timeout, JobRepo::heartbeat(pool, &job.id, worker_id)).await?;
        if held {
            Ok(())
        } else {
            Err(not_held(job, worker_id))
        }
    }

    async fn release(
        &self,
        job: &Job,
        worker_id: &str,
        outcome: JobStatus,
    ) -> Result<(), LeaseError> {
        let pool = self.require_pool()?;
        let finish = JobRepo::finish(pool, &job.id, worker_id, outcome);
        let finished = bounded(self.timeout, finish).await?;
        if finished {
            Ok(())
        } else {
            Err(not_held(job, worker_id))
        }
    }
}

impl PgJobStore {
    fn require_pool(&self) -> Result<&DbPool, LeaseError> {
        self.pool
            .as_ref()
            .ok_or_else(|| LeaseError::Unavailable("no database configured".into()))
    }
}

fn not_held(job: &Job, worker_id: &str) -> LeaseError {
    LeaseError::NotHeld {
        job_id: job.id.clone(),
        worker_id: worker_id.to_string(),
    }
}

#[async_trait]
impl EventSink for PgJobStore {
    async fn report(&self, event: &LifecycleEvent) -> Result<EventAck, SinkError> {
        let Some(pool) = &self.pool else {
            return Err(SinkError::Unavailable("no database configured".into()));
        };

        let inserted = bounded(self.timeout, EventRepo::insert_idempotent(pool, event)).await?;

        if inserted {
            Ok(EventAck::recorded())
        } else {
            tracing::debug!(key = %event.idempotency_key, "Duplicate lifecycle event ignored");
            Ok(EventAck::duplicate())
        }
    }
}
