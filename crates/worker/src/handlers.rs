//! Built-in handlers.

use std::time::Duration;

use async_trait::async_trait;
use jobline_core::execution::{ExecutionError, CALL_OUT_FAILED};
use jobline_core::job::Job;
use serde::Serialize;

use crate::executor::JobHandler;

/// Request body sent to a call-out service.
#[derive(Debug, Serialize)]
struct CallOutRequest<'a> {
    job_id: &'a str,
    job_type: &'a str,
    attempt: i32,
    trace_id: String,
    payload: &'a serde_json::Value,
}

/// Delegates a job to an external HTTP service (e.g. a decision or scoring
/// service) and uses its JSON response as the job output.
///
/// Any failure (timeout, transport, non-2xx, undecodable body) becomes a
/// `CALL_OUT_FAILED` result; the worker still reports the outcome.
#[derive(Debug, Clone)]
pub struct CallOutHandler {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl CallOutHandler {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), url, timeout)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, job: &Job) -> Result<serde_json::Value, String> {
        let body = CallOutRequest {
            job_id: &job.id,
            job_type: &job.job_type,
            attempt: job.attempt,
            trace_id: job.effective_trace_id(),
            payload: &job.payload,
        };

        tokio::time::timeout(self.timeout, self.post(&body))
            .await
            .map_err(|_| format!("call-out timed out after {:?}", self.timeout))?
    }

    async fn post(&self, body: &CallOutRequest<'_>) -> Result<serde_json::Value, String> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("call-out returned {status}: {text}"));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| format!("call-out returned invalid JSON: {e}"))
    }
}

#[async_trait]
impl JobHandler for CallOutHandler {
    async fn handle(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
        match self.call(job).await {
            Ok(output) => Ok(output),
            Err(reason) => {
                tracing::warn!(
                    job_id = %job.id,
                    url = %self.url,
                    error = %reason,
                    "Call-out failed"
                );
                Err(ExecutionError::new(CALL_OUT_FAILED, reason))
            }
        }
    }
}
