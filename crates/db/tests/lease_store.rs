//! Integration tests for the PostgreSQL lease store and event log.
//!
//! `sqlx::test` provisions a fresh database per test from `DATABASE_URL`.

use std::time::Duration;

use assert_matches::assert_matches;
use jobline_core::error::LeaseError;
use jobline_core::event::{EventAck, LifecycleEvent};
use jobline_core::job::JobStatus;
use jobline_core::lease::{EventSink, JobLease, WorkerIdentity};
use jobline_db::repositories::{EventRepo, JobRepo};
use jobline_db::PgJobStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: concurrent claims on a single pending job
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_claims_return_the_job_exactly_once(pool: PgPool) {
    let submitted = JobRepo::submit(&pool, "render", &serde_json::json!({}), None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let store = PgJobStore::new(pool.clone());
        handles.push(tokio::spawn(async move {
            store
                .claim(&WorkerIdentity::new(format!("w-{n}")))
                .await
                .unwrap()
                .job
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            winners.push(job);
        }
    }

    assert_eq!(winners.len(), 1, "exactly one claimer must win");
    assert_eq!(winners[0].id, submitted.id);
    assert_eq!(winners[0].status, JobStatus::Running);
    assert_eq!(winners[0].attempt, 1);
    assert!(winners[0].locked_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: claim order and empty outcome
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn claims_oldest_first_then_reports_empty(pool: PgPool) {
    let first = JobRepo::submit(&pool, "render", &serde_json::json!({"n": 1}), None)
        .await
        .unwrap();
    let second = JobRepo::submit(&pool, "render", &serde_json::json!({"n": 2}), None)
        .await
        .unwrap();

    let store = PgJobStore::new(pool.clone());
    let worker = WorkerIdentity::new("w-1");

    assert_eq!(store.claim(&worker).await.unwrap().job.unwrap().id, first.id);
    assert_eq!(store.claim(&worker).await.unwrap().job.unwrap().id, second.id);
    assert!(store.claim(&worker).await.unwrap().job.is_none());
}

// ---------------------------------------------------------------------------
// Test: release only by the lock holder, only from RUNNING
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn release_moves_running_job_to_terminal_status(pool: PgPool) {
    JobRepo::submit(&pool, "render", &serde_json::json!({}), None)
        .await
        .unwrap();
    let store = PgJobStore::new(pool.clone());
    let job = store
        .claim(&WorkerIdentity::new("w-1"))
        .await
        .unwrap()
        .job
        .unwrap();

    assert!(store.release(&job, "w-2", JobStatus::Succeeded).await.is_err());
    store.heartbeat(&job, "w-1").await.unwrap();
    store.release(&job, "w-1", JobStatus::Failed).await.unwrap();

    let row = JobRepo::find_by_id(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Failed.id());
    assert!(row.completed_at.is_some());

    // A terminal job is never rewritten.
    assert!(store.release(&job, "w-1", JobStatus::Succeeded).await.is_err());
}

// ---------------------------------------------------------------------------
// Test: idempotent event reporting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn same_event_twice_is_recorded_once(pool: PgPool) {
    JobRepo::submit(&pool, "render", &serde_json::json!({}), None)
        .await
        .unwrap();
    let store = PgJobStore::new(pool.clone());
    let job = store
        .claim(&WorkerIdentity::new("w-1"))
        .await
        .unwrap()
        .job
        .unwrap();

    let event = LifecycleEvent::started(&job, "w-1");
    assert_eq!(store.report(&event).await.unwrap(), EventAck::recorded());
    assert_eq!(store.report(&event).await.unwrap(), EventAck::duplicate());

    let rows = EventRepo::list_for_job(&pool, &job.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, "job.started");
    assert_eq!(rows[0].idempotency_key, event.idempotency_key);
}

// ---------------------------------------------------------------------------
// Test: a call blocked on a row lock gives up at the store timeout
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn heartbeat_blocked_by_row_lock_times_out(pool: PgPool) {
    JobRepo::submit(&pool, "render", &serde_json::json!({}), None)
        .await
        .unwrap();
    let store = PgJobStore::new(pool.clone()).with_timeout(Duration::from_millis(300));
    let job = store
        .claim(&WorkerIdentity::new("w-1"))
        .await
        .unwrap()
        .job
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM jobs WHERE id = $1 FOR UPDATE")
        .bind(&job.id)
        .execute(&mut *tx)
        .await
        .unwrap();

    assert_matches!(
        store.heartbeat(&job, "w-1").await,
        Err(LeaseError::Timeout(d)) if d == Duration::from_millis(300)
    );

    tx.rollback().await.unwrap();
    store.heartbeat(&job, "w-1").await.unwrap();
}
