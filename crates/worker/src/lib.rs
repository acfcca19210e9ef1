//! Leased background job worker.
//!
//! Claims jobs from a PostgreSQL job table or a remote queue service, runs
//! them through registered handlers, and reports `job.started`,
//! `job.heartbeat`, and terminal events with idempotency keys.

pub mod app;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod health;
pub mod heartbeat;
pub mod notify;
pub mod worker_loop;

pub use config::{LeaseBackendConfig, WorkerConfig};
pub use error::{ConfigError, WorkerError};
pub use executor::{handler_fn, Executor, JobHandler};
pub use worker_loop::{LoopConfig, LoopState, Step, WorkerLoop, WorkerStatus};
