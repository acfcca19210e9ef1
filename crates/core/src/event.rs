//! Lifecycle events reported for every leased job.
//!
//! A [`LifecycleEvent`] is an immutable, append-only fact about one job
//! attempt. Its `idempotency_key` lets any sink drop repeated deliveries.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::execution::ExecutionError;
use crate::idempotency::idempotency_key;
use crate::job::Job;
use crate::types::{JobId, Timestamp};

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "job.started")]
    Started,
    #[serde(rename = "job.heartbeat")]
    Heartbeat,
    #[serde(rename = "job.succeeded")]
    Succeeded,
    #[serde(rename = "job.failed")]
    Failed,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "job.started",
            Self::Heartbeat => "job.heartbeat",
            Self::Succeeded => "job.succeeded",
            Self::Failed => "job.failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle fact. Serialized as-is into the `/event` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub idempotency_key: String,
    pub event_type: EventType,
    pub job_id: JobId,
    pub job_type: String,
    pub attempt: i32,
    /// Heartbeat sub-sequence, starting at 1 per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub worker_id: String,
    pub trace_id: String,
    pub occurred_at: Timestamp,
    /// Event-specific data (elapsed time, output, error).
    #[serde(default)]
    pub data: serde_json::Value,
}

impl LifecycleEvent {
    fn for_job(job: &Job, worker_id: &str, event_type: EventType, seq: Option<u64>) -> Self {
        Self {
            idempotency_key: idempotency_key(&job.id, event_type.as_str(), job.attempt, seq),
            event_type,
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            attempt: job.attempt,
            seq,
            worker_id: worker_id.to_string(),
            trace_id: job.effective_trace_id(),
            occurred_at: Utc::now(),
            data: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn started(job: &Job, worker_id: &str) -> Self {
        Self::for_job(job, worker_id, EventType::Started, None)
    }

    pub fn heartbeat(job: &Job, worker_id: &str, seq: u64, elapsed: Duration) -> Self {
        let mut event = Self::for_job(job, worker_id, EventType::Heartbeat, Some(seq));
        event.data = serde_json::json!({ "elapsed_ms": elapsed.as_millis() as u64 });
        event
    }

    pub fn succeeded(
        job: &Job,
        worker_id: &str,
        output: serde_json::Value,
        duration: Duration,
    ) -> Self {
        let mut event = Self::for_job(job, worker_id, EventType::Succeeded, None);
        event.data = serde_json::json!({
            "output": output,
            "duration_ms": duration.as_millis() as u64,
        });
        event
    }

    /// Terminal failure. Always marked retryable: retry policy belongs to
    /// whatever re-enqueues the job.
    pub fn failed(job: &Job, worker_id: &str, error: &ExecutionError, duration: Duration) -> Self {
        let mut event = Self::for_job(job, worker_id, EventType::Failed, None);
        event.data = serde_json::json!({
            "error": error,
            "retryable": true,
            "duration_ms": duration.as_millis() as u64,
        });
        event
    }

    /// Error code of a `job.failed` event.
    pub fn error_code(&self) -> Option<&str> {
        self.data.get("error")?.get("code")?.as_str()
    }
}

/// Acknowledgement returned by an event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAck {
    #[serde(default = "accepted_by_default")]
    pub accepted: bool,
    /// The key was already recorded; this delivery changed nothing.
    #[serde(default)]
    pub duplicate: bool,
}

fn accepted_by_default() -> bool {
    true
}

impl EventAck {
    pub fn recorded() -> Self {
        Self {
            accepted: true,
            duplicate: false,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            accepted: true,
            duplicate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::UNKNOWN_JOB_TYPE;
    use serde_json::json;

    fn job() -> Job {
        let mut job = Job::new("j-1", "render", json!({"trace_id": "tr-1"}));
        job.attempt = 2;
        job
    }

    #[test]
    fn started_event_has_attempt_scoped_key() {
        let event = LifecycleEvent::started(&job(), "w-1");
        assert_eq!(event.idempotency_key, "j-1:job.started:2");
        assert_eq!(event.trace_id, "tr-1");
        assert!(event.seq.is_none());
    }

    #[test]
    fn heartbeat_carries_sequence_and_elapsed() {
        let event = LifecycleEvent::heartbeat(&job(), "w-1", 3, Duration::from_millis(60_000));
        assert_eq!(event.idempotency_key, "j-1:job.heartbeat:2:3");
        assert_eq!(event.seq, Some(3));
        assert_eq!(event.data["elapsed_ms"], 60_000);
    }

    #[test]
    fn failed_event_is_always_retryable() {
        let error = ExecutionError::new(UNKNOWN_JOB_TYPE, "nope");
        let event = LifecycleEvent::failed(&job(), "w-1", &error, Duration::from_millis(5));
        assert_eq!(event.data["retryable"], true);
        assert_eq!(event.error_code(), Some(UNKNOWN_JOB_TYPE));
    }

    #[test]
    fn event_type_serializes_dotted() {
        let json = serde_json::to_value(LifecycleEvent::started(&job(), "w-1")).unwrap();
        assert_eq!(json["event_type"], "job.started");
        assert!(json.get("seq").is_none());
    }

    #[test]
    fn ack_defaults_to_accepted() {
        let ack: EventAck = serde_json::from_value(json!({})).unwrap();
        assert_eq!(ack, EventAck::recorded());
    }
}
