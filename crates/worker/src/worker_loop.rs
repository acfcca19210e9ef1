//! The worker's poll / execute / report cycle.
//!
//! ```text
//! IDLE ──► CLAIMING ──(no job / error)──► IDLE   (jittered idle backoff)
//!              │
//!              └──(job)──► RUNNING ──► REPORTING ──► IDLE   (jittered pace)
//! ```
//!
//! `RUNNING` emits heartbeats from a separate task without changing state.
//! Only the store's atomic claim decides who runs a job; everything this
//! loop reports is best-effort and never stops it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobline_core::backoff::{jitter, IDLE_JITTER_RATIO, PACE_JITTER_RATIO};
use jobline_core::event::LifecycleEvent;
use jobline_core::execution::{ExecutionError, ExecutionResult, HANDLER_ERROR};
use jobline_core::job::{Job, JobStatus};
use jobline_core::lease::{EventSink, JobLease, WorkerIdentity};
use jobline_core::notify::Notifier;
use jobline_core::types::{JobId, Timestamp};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::executor::Executor;
use crate::heartbeat::Heartbeat;
use crate::notify::notify_outcome;

/// Timing knobs for the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub heartbeat_interval: Duration,
    /// Sleep after an empty claim when the backend gives no advice.
    pub idle_backoff: Duration,
    pub idle_jitter_ratio: f64,
    /// Pause between consecutive jobs.
    pub pace: Duration,
    pub pace_jitter_ratio: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(20),
            idle_backoff: Duration::from_millis(1000),
            idle_jitter_ratio: IDLE_JITTER_RATIO,
            pace: Duration::from_millis(80),
            pace_jitter_ratio: PACE_JITTER_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Claiming,
    Running,
    Reporting,
    Stopped,
}

/// Point-in-time view of the loop, served by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub worker_id: String,
    pub state: LoopState,
    pub current_job: Option<JobId>,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub last_claim_at: Option<Timestamp>,
}

/// Shared, cheaply cloneable loop status.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl WorkerStatus {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                worker_id: worker_id.into(),
                state: LoopState::Idle,
                current_job: None,
                jobs_succeeded: 0,
                jobs_failed: 0,
                last_claim_at: None,
            })),
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }

    async fn set_state(&self, state: LoopState) {
        self.inner.write().await.state = state;
    }

    async fn job_claimed(&self, job_id: &str) {
        let mut status = self.inner.write().await;
        status.state = LoopState::Running;
        status.current_job = Some(job_id.to_string());
        status.last_claim_at = Some(Utc::now());
    }

    async fn job_finished(&self, ok: bool) {
        let mut status = self.inner.write().await;
        if ok {
            status.jobs_succeeded += 1;
        } else {
            status.jobs_failed += 1;
        }
        status.current_job = None;
        status.state = LoopState::Idle;
    }
}

/// Outcome of one [`WorkerLoop::run_once`] pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing was claimed; sleep `backoff` before the next claim.
    Idle { backoff: Duration },
    /// A job ran to a terminal event; sleep `pace` before the next claim.
    Completed { job_id: JobId, ok: bool, pace: Duration },
}

impl Step {
    pub fn pause(&self) -> Duration {
        match self {
            Self::Idle { backoff } => *backoff,
            Self::Completed { pace, .. } => *pace,
        }
    }
}

pub struct WorkerLoop {
    identity: WorkerIdentity,
    lease: Arc<dyn JobLease>,
    sink: Arc<dyn EventSink>,
    executor: Arc<Executor>,
    notifier: Arc<dyn Notifier>,
    config: LoopConfig,
    status: WorkerStatus,
}

impl WorkerLoop {
    pub fn new(
        identity: WorkerIdentity,
        lease: Arc<dyn JobLease>,
        sink: Arc<dyn EventSink>,
        executor: Arc<Executor>,
        notifier: Arc<dyn Notifier>,
        config: LoopConfig,
    ) -> Self {
        let status = WorkerStatus::new(identity.worker_id.clone());
        Self {
            identity,
            lease,
            sink,
            executor,
            notifier,
            config,
            status,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.clone()
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Run until `cancel` fires. A job in flight is always finished and
    /// reported; cancellation takes effect at the next sleep or claim.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            worker_id = %self.identity.worker_id,
            job_types = ?self.executor.job_types(),
            "Worker loop started"
        );

        while !cancel.is_cancelled() {
            let step = self.run_once().await;
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(step.pause()) => {}
            }
        }

        self.status.set_state(LoopState::Stopped).await;
        tracing::info!(worker_id = %self.identity.worker_id, "Worker loop stopped");
    }

    /// One claim, and if it yields a job, one full execution. Returns how
    /// long the caller should pause before the next pass.
    pub async fn run_once(&self) -> Step {
        self.status.set_state(LoopState::Claiming).await;

        let claim = match self.lease.claim(&self.identity).await {
            Ok(claim) => claim,
            Err(e) => {
                tracing::warn!(worker_id = %self.identity.worker_id, error = %e, "Claim failed");
                return self.idle(None).await;
            }
        };

        match claim.job {
            Some(job) => self.process(job).await,
            None => self.idle(claim.backoff).await,
        }
    }

    async fn idle(&self, advised: Option<Duration>) -> Step {
        self.status.set_state(LoopState::Idle).await;
        let nominal = advised.unwrap_or(self.config.idle_backoff);
        Step::Idle {
            backoff: jitter(nominal, self.config.idle_jitter_ratio),
        }
    }

    async fn process(&self, job: Job) -> Step {
        let span = tracing::info_span!(
            "job",
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempt,
            trace_id = %job.effective_trace_id(),
        );
        self.execute_leased(job).instrument(span).await
    }

    async fn execute_leased(&self, job: Job) -> Step {
        let worker_id = self.identity.worker_id.as_str();
        tracing::info!("Job leased");

        self.status.job_claimed(&job.id).await;
        self.report_best_effort(&LifecycleEvent::started(&job, worker_id)).await;

        let heartbeat = Heartbeat::start(
            job.clone(),
            worker_id.to_string(),
            Arc::clone(&self.sink),
            Arc::clone(&self.lease),
            self.config.heartbeat_interval,
        );
        let started = Instant::now();
        let result = self.executor.execute(&job).await;
        let duration = started.elapsed();
        let beats = heartbeat.stop().await;

        self.status.set_state(LoopState::Reporting).await;
        let (event, outcome) = terminal_event(&job, worker_id, &result, duration);
        self.report_best_effort(&event).await;

        if let Err(e) = self.lease.release(&job, worker_id, outcome).await {
            tracing::warn!(error = %e, "Lease release failed");
        }

        notify_outcome(self.notifier.as_ref(), &job, &result).await;

        tracing::info!(
            ok = result.ok,
            code = result.error_code().unwrap_or_default(),
            duration_ms = duration.as_millis() as u64,
            heartbeats = beats,
            "Job finished"
        );
        self.status.job_finished(result.ok).await;

        Step::Completed {
            job_id: job.id,
            ok: result.ok,
            pace: jitter(self.config.pace, self.config.pace_jitter_ratio),
        }
    }

    /// Deliver one lifecycle event. Failures are logged and swallowed.
    async fn report_best_effort(&self, event: &LifecycleEvent) {
        match self.sink.report(event).await {
            Ok(ack) if ack.duplicate => {
                tracing::debug!(key = %event.idempotency_key, "Event already recorded");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    event_type = %event.event_type,
                    key = %event.idempotency_key,
                    error = %e,
                    "Event report failed"
                );
            }
        }
    }
}

fn terminal_event(
    job: &Job,
    worker_id: &str,
    result: &ExecutionResult,
    duration: Duration,
) -> (LifecycleEvent, JobStatus) {
    if result.ok {
        let output = result.output.clone().unwrap_or(serde_json::Value::Null);
        return (
            LifecycleEvent::succeeded(job, worker_id, output, duration),
            JobStatus::Succeeded,
        );
    }
    let error = result
        .error
        .clone()
        .unwrap_or_else(|| ExecutionError::new(HANDLER_ERROR, "handler failed without detail"));
    (
        LifecycleEvent::failed(job, worker_id, &error, duration),
        JobStatus::Failed,
    )
}
