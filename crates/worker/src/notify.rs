//! Best-effort outcome notifications.

use jobline_core::error::NotifyError;
use jobline_core::execution::ExecutionResult;
use jobline_core::job::Job;
use jobline_core::notify::Notifier;

/// Human-readable status line for a finished job.
pub fn status_text(job: &Job, result: &ExecutionResult) -> String {
    if result.ok {
        return format!("Job {} ({}) succeeded on attempt {}", job.id, job.job_type, job.attempt);
    }
    match &result.error {
        Some(err) => format!(
            "Job {} ({}) failed on attempt {}: {} ({})",
            job.id, job.job_type, job.attempt, err.message, err.code
        ),
        None => format!("Job {} ({}) failed on attempt {}", job.id, job.job_type, job.attempt),
    }
}

/// Tell the job's recipient how it went. Never fails: jobs without
/// `payload.chat_id` are skipped and delivery errors are only logged.
pub async fn notify_outcome(notifier: &dyn Notifier, job: &Job, result: &ExecutionResult) {
    let Some(recipient) = job.notify_recipient() else {
        tracing::debug!(job_id = %job.id, "No notification recipient");
        return;
    };
    let channel = job.namespace();

    match notifier.send(&channel, &recipient, &status_text(job, result)).await {
        Ok(()) => {}
        Err(NotifyError::NotConfigured(ns)) => {
            tracing::debug!(
                job_id = %job.id,
                namespace = %ns,
                "Notification channel not configured"
            );
        }
        Err(e) => {
            tracing::warn!(
                job_id = %job.id,
                namespace = %channel,
                error = %e,
                "Notification failed"
            );
        }
    }
}
