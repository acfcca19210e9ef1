//! Remote collaborators of the worker.
//!
//! - [`QueueClient`]: HTTP-mediated lease and lifecycle event sink for
//!   deployments where the job table is not directly reachable.
//! - [`ChatNotifier`]: chat-bot side channel for human-readable status.

pub mod error;
pub mod notifier;
pub mod queue_client;

pub use error::QueueError;
pub use notifier::{ChatNotifier, ChatNotifierConfig};
pub use queue_client::{Envelope, QueueClient, QueueConfig};
