//! In-process lease store and event log for tests and local runs.
//!
//! Same contracts as the PostgreSQL and HTTP backends: a claim is one
//! critical section over the whole table, so concurrent claimers never
//! receive the same job, and the event log drops repeated keys.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{LeaseError, SinkError};
use crate::event::{EventAck, EventType, LifecycleEvent};
use crate::job::{Job, JobStatus};
use crate::lease::{Claim, EventSink, JobLease, WorkerIdentity};
use crate::types::JobId;

// ---------------------------------------------------------------------------
// InMemoryJobStore
// ---------------------------------------------------------------------------

/// Job table held in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    next_id: AtomicU64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a pending job and return it.
    pub async fn submit(&self, job_type: &str, payload: serde_json::Value) -> Job {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let job = Job::new(format!("mem-{n}"), job_type, payload);
        self.jobs.lock().await.push(job.clone());
        job
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().await.iter().find(|j| j.id == job_id).cloned()
    }

    pub async fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.lock().await.iter().filter(|j| j.status == status).count()
    }
}

#[async_trait]
impl JobLease for InMemoryJobStore {
    async fn claim(&self, worker: &WorkerIdentity) -> Result<Claim, LeaseError> {
        let mut jobs = self.jobs.lock().await;

        // Oldest first; insertion order breaks created_at ties.
        let next = jobs
            .iter_mut()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Pending && j.locked_at.is_none())
            .min_by_key(|(idx, j)| (j.created_at, *idx))
            .map(|(_, j)| j);

        let Some(job) = next else {
            return Ok(Claim::empty());
        };

        job.status = JobStatus::Running;
        job.locked_by = Some(worker.worker_id.clone());
        job.locked_at = Some(Utc::now());
        job.attempt += 1;
        Ok(Claim::leased(job.clone()))
    }

    async fn heartbeat(&self, job: &Job, worker_id: &str) -> Result<(), LeaseError> {
        let jobs = self.jobs.lock().await;
        match jobs.iter().find(|j| j.id == job.id) {
            Some(j)
                if j.status == JobStatus::Running
                    && j.locked_by.as_deref() == Some(worker_id) =>
            {
                Ok(())
            }
            _ => Err(not_held(&job.id, worker_id)),
        }
    }

    async fn release(
        &self,
        job: &Job,
        worker_id: &str,
        outcome: JobStatus,
    ) -> Result<(), LeaseError> {
        let mut jobs = self.jobs.lock().await;
        let held = jobs.iter_mut().find(|j| {
            j.id == job.id
                && j.locked_by.as_deref() == Some(worker_id)
                && j.status.can_transition_to(outcome)
        });
        match held {
            Some(j) => {
                j.status = outcome;
                Ok(())
            }
            None => Err(not_held(&job.id, worker_id)),
        }
    }
}

fn not_held(job_id: &JobId, worker_id: &str) -> LeaseError {
    LeaseError::NotHeld {
        job_id: job_id.clone(),
        worker_id: worker_id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// InMemoryEventLog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EventLogInner {
    keys: HashSet<String>,
    events: Vec<LifecycleEvent>,
}

/// Append-only event log keyed by idempotency key.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    inner: Mutex<EventLogInner>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every logically distinct event, in arrival order.
    pub async fn events(&self) -> Vec<LifecycleEvent> {
        self.inner.lock().await.events.clone()
    }

    pub async fn events_for(&self, job_id: &str) -> Vec<LifecycleEvent> {
        self.inner
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn event_types_for(&self, job_id: &str) -> Vec<EventType> {
        self.events_for(job_id).await.into_iter().map(|e| e.event_type).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn report(&self, event: &LifecycleEvent) -> Result<EventAck, SinkError> {
        let mut inner = self.inner.lock().await;
        if !inner.keys.insert(event.idempotency_key.clone()) {
            return Ok(EventAck::duplicate());
        }
        inner.events.push(event.clone());
        Ok(EventAck::recorded())
    }
}
