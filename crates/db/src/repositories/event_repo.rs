//! Repository for the `job_events` table.

use jobline_core::event::LifecycleEvent;
use sqlx::PgPool;

use crate::models::job_event::JobEventRow;

/// Column list for `job_events` queries.
const COLUMNS: &str = "\
    id, idempotency_key, job_id, job_type, event_type, attempt, seq, \
    worker_id, trace_id, data, occurred_at, recorded_at";

/// Append-only access to lifecycle events.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event unless its idempotency key is already recorded.
    ///
    /// Returns `true` if a row was written, `false` for a duplicate.
    pub async fn insert_idempotent(
        pool: &PgPool,
        event: &LifecycleEvent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO job_events \
                (idempotency_key, job_id, job_type, event_type, attempt, seq, \
                 worker_id, trace_id, data, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (idempotency_key) DO NOTHING",
        )
        .bind(&event.idempotency_key)
        .bind(&event.job_id)
        .bind(&event.job_type)
        .bind(event.event_type.as_str())
        .bind(event.attempt)
        .bind(event.seq.map(|s| s as i64))
        .bind(&event.worker_id)
        .bind(&event.trace_id)
        .bind(&event.data)
        .bind(event.occurred_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All events for a job, oldest first.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: &str,
    ) -> Result<Vec<JobEventRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_events WHERE job_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, JobEventRow>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
