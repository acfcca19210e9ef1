//! The job record as seen by a worker.
//!
//! A [`Job`] arrives either from the `jobs` table (direct store) or from the
//! queue service's `/next-job` envelope. Both share this shape.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Status ID type matching SMALLINT in the `jobs` table.
pub type StatusId = i16;

/// Job lifecycle status.
///
/// Each discriminant matches the `status_id` stored in the `jobs` table.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to a status, if known.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Running),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Wire / log representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// `PENDING → RUNNING` on claim, `RUNNING → SUCCEEDED | FAILED` on
    /// completion. Nothing else.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    /// Status of a job handed out by the queue service, which never sends
    /// the field: anything it leases is running.
    fn leased() -> Self {
        Self::Running
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first_attempt() -> i32 {
    1
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Discriminator selecting the execution handler.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Opaque handler input. The queue service may call it `params`.
    #[serde(default, alias = "params")]
    pub payload: serde_json::Value,
    #[serde(default = "JobStatus::leased")]
    pub status: JobStatus,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub locked_at: Option<Timestamp>,
    #[serde(default = "first_attempt")]
    pub attempt: i32,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Job {
    /// Build a fresh pending job. Mostly useful for tests and enqueue tools.
    pub fn new(
        id: impl Into<JobId>,
        job_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            payload,
            status: JobStatus::Pending,
            locked_by: None,
            locked_at: None,
            attempt: 0,
            trace_id: None,
            created_at: Some(chrono::Utc::now()),
        }
    }

    /// Cross-system correlation id: the explicit field, then
    /// `payload.trace_id`, then the job id itself.
    pub fn effective_trace_id(&self) -> String {
        if let Some(trace) = self.trace_id.as_deref().filter(|t| !t.is_empty()) {
            return trace.to_string();
        }
        match self.payload.get("trace_id").and_then(|v| v.as_str()) {
            Some(trace) if !trace.is_empty() => trace.to_string(),
            _ => self.id.clone(),
        }
    }

    /// Notification namespace: `payload.namespace`, else the job type.
    pub fn namespace(&self) -> String {
        self.payload
            .get("namespace")
            .and_then(|v| v.as_str())
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_namespace(&self.job_type).to_string())
    }

    /// Notification recipient taken from `payload.chat_id`.
    ///
    /// Accepts strings and integers; anything else means "no recipient".
    pub fn notify_recipient(&self) -> Option<String> {
        match self.payload.get("chat_id")? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Default notification namespace for a job type.
///
/// Dotted or versioned types (`render.v2`) share the namespace of their
/// leading segment.
pub fn default_namespace(job_type: &str) -> &str {
    job_type.split('.').next().unwrap_or(job_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_status_ids_match_table() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Succeeded.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
        assert_eq!(JobStatus::from_id(3), Some(JobStatus::Succeeded));
        assert_eq!(JobStatus::from_id(9), None);
    }

    #[test]
    fn only_lease_and_completion_transitions_are_valid() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Running.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Succeeded));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn queue_job_deserializes_with_defaults() {
        let job: Job = serde_json::from_value(json!({
            "id": "j-1",
            "type": "render",
            "params": {"clip": 3}
        }))
        .unwrap();

        assert_eq!(job.job_type, "render");
        assert_eq!(job.payload["clip"], 3);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempt, 1);
        assert!(job.locked_by.is_none());
    }

    #[test]
    fn status_serializes_screaming_case() {
        assert_eq!(serde_json::to_value(JobStatus::Succeeded).unwrap(), "SUCCEEDED");
        assert_eq!(JobStatus::Pending.to_string(), "PENDING");
    }

    #[test]
    fn trace_id_falls_back_to_payload_then_id() {
        let mut job = Job::new("j-7", "render", json!({"trace_id": "tr-9"}));
        assert_eq!(job.effective_trace_id(), "tr-9");

        job.trace_id = Some("explicit".into());
        assert_eq!(job.effective_trace_id(), "explicit");

        let bare = Job::new("j-8", "render", json!({}));
        assert_eq!(bare.effective_trace_id(), "j-8");
    }

    #[test]
    fn namespace_defaults_by_job_type() {
        let job = Job::new("j", "decision.request", json!({}));
        assert_eq!(job.namespace(), "decision");

        let job = Job::new("j", "render", json!({"namespace": "studio"}));
        assert_eq!(job.namespace(), "studio");
    }

    #[test]
    fn recipient_accepts_strings_and_numbers() {
        let job = Job::new("j", "render", json!({"chat_id": -100123}));
        assert_eq!(job.notify_recipient().as_deref(), Some("-100123"));

        let job = Job::new("j", "render", json!({"chat_id": " 42 "}));
        assert_eq!(job.notify_recipient().as_deref(), Some("42"));

        let job = Job::new("j", "render", json!({"chat_id": null}));
        assert!(job.notify_recipient().is_none());

        let job = Job::new("j", "render", json!({}));
        assert!(job.notify_recipient().is_none());
    }
}
