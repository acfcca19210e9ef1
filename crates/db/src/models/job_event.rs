//! Lifecycle event row model.

use jobline_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `job_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobEventRow {
    pub id: i64,
    pub idempotency_key: String,
    pub job_id: JobId,
    pub job_type: String,
    pub event_type: String,
    pub attempt: i32,
    pub seq: Option<i64>,
    pub worker_id: String,
    pub trace_id: String,
    pub data: serde_json::Value,
    pub occurred_at: Timestamp,
    pub recorded_at: Timestamp,
}
