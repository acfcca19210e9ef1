//! HTTP client for the remote queue service.
//!
//! Two endpoints, both bearer-authenticated JSON `POST`s:
//!
//! - `/next-job`: lease the next job, or learn how long to back off.
//! - `/event`: append a lifecycle event; the service deduplicates by
//!   idempotency key.
//!
//! Each call runs under its own [`tokio::time::timeout`]. When it elapses
//! the request future is dropped, so nothing keeps running past the
//! boundary and the call counts as failed whatever the transport does later.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use jobline_core::error::{LeaseError, SinkError};
use jobline_core::event::{EventAck, LifecycleEvent};
use jobline_core::job::Job;
use jobline_core::lease::{Claim, EventSink, JobLease, WorkerIdentity};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Default timeout for `/next-job`.
pub const DEFAULT_NEXT_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for `/event`.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header mirroring the event's idempotency key.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Queue service endpoints and credentials.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub next_job_url: String,
    pub event_url: String,
    /// Bearer token sent on every request.
    pub token: String,
    pub next_job_timeout: Duration,
    pub event_timeout: Duration,
}

impl QueueConfig {
    /// Derive both endpoint URLs from a base URL with default timeouts.
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            next_job_url: format!("{base}/next-job"),
            event_url: format!("{base}/event"),
            token: token.into(),
            next_job_timeout: DEFAULT_NEXT_JOB_TIMEOUT,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, next_job: Duration, event: Duration) -> Self {
        self.next_job_timeout = next_job;
        self.event_timeout = event;
        self
    }
}

/// Body of a `/next-job` request.
#[derive(Debug, Serialize)]
struct NextJobRequest<'a> {
    worker_id: &'a str,
    capabilities: &'a [String],
    prefetch: u32,
}

/// Response to a `/next-job` request: a job, or an advisory backoff.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

/// HTTP client for one queue service.
#[derive(Debug, Clone)]
pub struct QueueClient {
    client: reqwest::Client,
    config: QueueConfig,
}

impl QueueClient {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: QueueConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Ask the queue for the next job.
    ///
    /// A non-2xx response is an error: it means the queue itself is down or
    /// misconfigured. "No work" is an envelope without a job.
    pub async fn request_next_job(&self, worker: &WorkerIdentity) -> Result<Envelope, QueueError> {
        let body = NextJobRequest {
            worker_id: &worker.worker_id,
            capabilities: &worker.capabilities,
            prefetch: worker.prefetch,
        };

        let text = bounded(self.config.next_job_timeout, async {
            let response = self
                .client
                .post(&self.config.next_job_url)
                .bearer_auth(&self.config.token)
                .json(&body)
                .send()
                .await?;
            read_success_body(response).await
        })
        .await?;

        if text.trim().is_empty() {
            return Ok(Envelope::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Append a lifecycle event.
    ///
    /// The caller decides whether a failure is worth more than a log line.
    pub async fn report_event(&self, event: &LifecycleEvent) -> Result<EventAck, QueueError> {
        let text = bounded(self.config.event_timeout, async {
            let response = self
                .client
                .post(&self.config.event_url)
                .bearer_auth(&self.config.token)
                .header(IDEMPOTENCY_HEADER, &event.idempotency_key)
                .json(event)
                .send()
                .await?;
            read_success_body(response).await
        })
        .await?;

        // Any 2xx is an acknowledgement; a JSON body may refine it.
        Ok(serde_json::from_str::<EventAck>(&text).unwrap_or_else(|_| EventAck::recorded()))
    }
}

/// Run `call` under `limit`, dropping it on expiry.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, QueueError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| QueueError::Timeout(limit))?
}

/// Return the body of a 2xx response, or a [`QueueError::Status`].
async fn read_success_body(response: reqwest::Response) -> Result<String, QueueError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(QueueError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

#[async_trait]
impl JobLease for QueueClient {
    async fn claim(&self, worker: &WorkerIdentity) -> Result<Claim, LeaseError> {
        let envelope = self.request_next_job(worker).await?;
        Ok(match envelope.job {
            Some(job) => Claim::leased(job),
            None => Claim::idle(envelope.backoff_ms.map(Duration::from_millis)),
        })
    }
}

#[async_trait]
impl EventSink for QueueClient {
    async fn report(&self, event: &LifecycleEvent) -> Result<EventAck, SinkError> {
        Ok(self.report_event(event).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_derives_endpoints_from_base() {
        let config = QueueConfig::new("https://queue.example.com/api/", "secret");
        assert_eq!(config.next_job_url, "https://queue.example.com/api/next-job");
        assert_eq!(config.event_url, "https://queue.example.com/api/event");
        assert_eq!(config.next_job_timeout, DEFAULT_NEXT_JOB_TIMEOUT);
    }

    #[test]
    fn envelope_without_job_parses() {
        let envelope: Envelope = serde_json::from_str(r#"{"backoff_ms": 1000}"#).unwrap();
        assert!(envelope.job.is_none());
        assert_eq!(envelope.backoff_ms, Some(1000));
    }

    #[test]
    fn envelope_with_job_parses() {
        let raw = r#"{"job": {"id": "j-1", "type": "render", "attempt": 3}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        let job = envelope.job.unwrap();
        assert_eq!(job.id, "j-1");
        assert_eq!(job.attempt, 3);
        assert!(envelope.backoff_ms.is_none());
    }
}
