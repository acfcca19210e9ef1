//! Job row model.

use jobline_core::job::{Job, JobStatus, StatusId};
use jobline_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRow {
    pub id: JobId,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub locked_by: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub heartbeat_at: Option<Timestamp>,
    pub attempt: i32,
    pub trace_id: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl JobRow {
    /// Convert into the worker-facing [`Job`].
    ///
    /// Fails only if the row carries a status ID outside `job_statuses`.
    pub fn into_job(self) -> Result<Job, sqlx::Error> {
        let status = JobStatus::from_id(self.status_id).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown job status_id {}", self.status_id).into())
        })?;

        Ok(Job {
            id: self.id,
            job_type: self.job_type,
            payload: self.payload,
            status,
            locked_by: self.locked_by,
            locked_at: self.locked_at,
            attempt: self.attempt,
            trace_id: self.trace_id,
            created_at: Some(self.created_at),
        })
    }
}
