//! Repository for the `jobs` table.
//!
//! Status literals always come from [`JobStatus`]; no bare numbers.

use jobline_core::job::JobStatus;
use sqlx::PgPool;

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, payload, status_id, locked_by, locked_at, heartbeat_at, \
    attempt, trace_id, created_at, completed_at, updated_at";

/// Lease operations over the shared job table.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    pub async fn submit(
        pool: &PgPool,
        job_type: &str,
        payload: &serde_json::Value,
        trace_id: Option<&str>,
    ) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_type, payload, status_id, trace_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_type)
            .bind(payload)
            .bind(JobStatus::Pending.id())
            .bind(trace_id)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest unlocked pending job for a worker.
    ///
    /// Selection and the `PENDING → RUNNING` update happen in one statement;
    /// `FOR UPDATE SKIP LOCKED` makes concurrent claimers pass over a row
    /// another transaction is taking instead of blocking on it. Returns
    /// `None` when nothing is claimable.
    pub async fn claim_next(pool: &PgPool, worker_id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, locked_by = $2, locked_at = NOW(), \
                 heartbeat_at = NOW(), attempt = attempt + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $3 AND locked_at IS NULL \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Running.id())
            .bind(worker_id)
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Touch `heartbeat_at` for a running job held by `worker_id`.
    ///
    /// Returns `false` if the worker no longer holds the job.
    pub async fn heartbeat(
        pool: &PgPool,
        job_id: &str,
        worker_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET heartbeat_at = NOW() \
             WHERE id = $1 AND locked_by = $2 AND status_id = $3",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a running job held by `worker_id` to a terminal status.
    ///
    /// Returns `false` if the job is not running under this worker's lock;
    /// terminal rows are never rewritten.
    pub async fn finish(
        pool: &PgPool,
        job_id: &str,
        worker_id: &str,
        outcome: JobStatus,
    ) -> Result<bool, sqlx::Error> {
        if !JobStatus::Running.can_transition_to(outcome) {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND locked_by = $2 AND status_id = $4",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(outcome.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count jobs currently in `status`.
    pub async fn count_by_status(pool: &PgPool, status: JobStatus) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status_id = $1")
            .bind(status.id())
            .fetch_one(pool)
            .await
    }
}
