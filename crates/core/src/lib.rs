//! Shared domain types and contracts for the jobline worker.
//!
//! - [`job::Job`] and [`job::JobStatus`]: the leased unit of work.
//! - [`event::LifecycleEvent`]: idempotent lifecycle facts.
//! - [`lease::JobLease`] / [`lease::EventSink`]: the seams both lease
//!   backends implement.
//! - [`notify::Notifier`]: the notification side channel.
//! - [`memory`]: in-process implementations of the seams.

pub mod backoff;
pub mod error;
pub mod event;
pub mod execution;
pub mod idempotency;
pub mod job;
pub mod lease;
pub mod memory;
pub mod notify;
pub mod types;

pub use error::{LeaseError, NotifyError, SinkError};
pub use event::{EventAck, EventType, LifecycleEvent};
pub use execution::{ExecutionError, ExecutionResult};
pub use job::{Job, JobStatus};
pub use lease::{Claim, EventSink, JobLease, WorkerIdentity};
pub use notify::{DisabledNotifier, Notifier};
