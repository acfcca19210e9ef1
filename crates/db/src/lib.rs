//! PostgreSQL job table and event log.
//!
//! The direct-store deployment: workers claim jobs with one atomic
//! `UPDATE … FOR UPDATE SKIP LOCKED` and append lifecycle events to
//! `job_events`, deduplicated by idempotency key.

use sqlx::postgres::PgPoolOptions;

pub mod lease;
pub mod models;
pub mod repositories;

pub use lease::PgJobStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the pool is usable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
