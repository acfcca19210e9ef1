//! Dispatch a leased job to its handler and normalize the outcome.
//!
//! Nothing a handler does escapes [`Executor::execute`] as a Rust error or
//! unwinding panic: unknown types, handler errors and panics all come back
//! as a failed [`ExecutionResult`] so the worker loop can always report.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use jobline_core::execution::{ExecutionError, ExecutionResult, HANDLER_PANIC};
use jobline_core::job::Job;

/// Business logic for one job type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<serde_json::Value, ExecutionError>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F>(F);

/// Wrap `f` as a handler. The closure receives its own copy of the job.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, ExecutionError>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, ExecutionError>> + Send,
{
    async fn handle(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
        (self.0)(job.clone()).await
    }
}

/// Registry of handlers keyed by job type.
#[derive(Default, Clone)]
pub struct Executor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_type`, replacing any earlier one.
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: impl JobHandler + 'static,
    ) -> &mut Self {
        let job_type = job_type.into();
        if self.handlers.insert(job_type.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(job_type = %job_type, "Handler replaced");
        }
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, job_type: impl Into<String>, handler: impl JobHandler + 'static) -> Self {
        self.register(job_type, handler);
        self
    }

    pub fn handles(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub async fn execute(&self, job: &Job) -> ExecutionResult {
        let Some(handler) = self.handlers.get(&job.job_type) else {
            tracing::warn!(job_id = %job.id, job_type = %job.job_type, "No handler for job type");
            return ExecutionResult::unknown_type(&job.job_type);
        };

        match AssertUnwindSafe(handler.handle(job)).catch_unwind().await {
            Ok(Ok(output)) => ExecutionResult::success(output),
            Ok(Err(err)) => {
                tracing::info!(
                    job_id = %job.id,
                    code = %err.code,
                    error = %err.message,
                    "Handler failed"
                );
                ExecutionResult::failure(err.code, err.message)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    panic = %message,
                    "Handler panicked"
                );
                ExecutionResult::failure(HANDLER_PANIC, message)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
