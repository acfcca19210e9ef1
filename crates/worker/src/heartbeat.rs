//! Periodic `job.heartbeat` emission while a job runs.
//!
//! The task is owned by a [`Heartbeat`] guard. [`Heartbeat::stop`] cancels
//! it and waits for it to finish, so no heartbeat can follow the terminal
//! event; dropping the guard without stopping aborts the task.

use std::sync::Arc;
use std::time::Duration;

use jobline_core::event::LifecycleEvent;
use jobline_core::job::Job;
use jobline_core::lease::{EventSink, JobLease};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to a running heartbeat task.
pub struct Heartbeat {
    cancel: CancellationToken,
    handle: Option<JoinHandle<u64>>,
}

impl Heartbeat {
    /// Spawn the heartbeat task. The first beat fires one `interval` after
    /// start, with `seq = 1`.
    pub fn start(
        job: Job,
        worker_id: String,
        sink: Arc<dyn EventSink>,
        lease: Arc<dyn JobLease>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut seq: u64 = 0;

            // Ticks stay on the `started + n * interval` grid however long
            // a beat takes; the first tick completes immediately.
            let mut ticker = tokio::time::interval_at(started, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                let at = tokio::select! {
                    () = token.cancelled() => break,
                    at = ticker.tick() => at,
                };

                seq += 1;
                let event = LifecycleEvent::heartbeat(&job, &worker_id, seq, at - started);
                tokio::select! {
                    () = token.cancelled() => break,
                    () = beat(&event, &job, &worker_id, sink.as_ref(), lease.as_ref()) => {}
                }
            }

            seq
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the task and wait until it has exited. Returns the number of
    /// heartbeats attempted.
    pub async fn stop(mut self) -> u64 {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.await {
            Ok(beats) => beats,
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat task ended abnormally");
                0
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            handle.abort();
        }
    }
}

/// Report one heartbeat and refresh the lease. Failures are logged only.
async fn beat(
    event: &LifecycleEvent,
    job: &Job,
    worker_id: &str,
    sink: &dyn EventSink,
    lease: &dyn JobLease,
) {
    if let Err(e) = sink.report(event).await {
        tracing::warn!(job_id = %job.id, seq = ?event.seq, error = %e, "Heartbeat report failed");
    }
    if let Err(e) = lease.heartbeat(job, worker_id).await {
        tracing::debug!(job_id = %job.id, error = %e, "Lease refresh failed");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use jobline_core::error::SinkError;
    use jobline_core::event::{EventAck, EventType};
    use jobline_core::memory::{InMemoryEventLog, InMemoryJobStore};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;

    /// Sink that takes `delay` per report and records when each one began.
    struct SlowSink {
        origin: Instant,
        delay: Duration,
        seen: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl EventSink for SlowSink {
        async fn report(&self, _event: &LifecycleEvent) -> Result<EventAck, SinkError> {
            self.seen.lock().await.push(self.origin.elapsed());
            tokio::time::sleep(self.delay).await;
            Ok(EventAck::recorded())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn beats_every_interval_until_stopped() {
        let log = Arc::new(InMemoryEventLog::new());
        let store = Arc::new(InMemoryJobStore::new());
        let job = Job::new("j-1", "render", json!({}));

        let heartbeat = Heartbeat::start(
            job.clone(),
            "w-1".into(),
            log.clone(),
            store,
            Duration::from_secs(20),
        );
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(heartbeat.stop().await, 3);

        let events = log.events().await;
        assert!(events.iter().all(|e| e.event_type == EventType::Heartbeat));
        let seqs: Vec<_> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(events[1].data["elapsed_ms"], 40_000);

        // Nothing after stop.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn beats_stay_on_schedule_with_slow_sink() {
        let sink = Arc::new(SlowSink {
            origin: Instant::now(),
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let job = Job::new("j-1", "render", json!({}));

        let heartbeat = Heartbeat::start(
            job,
            "w-1".into(),
            sink.clone(),
            Arc::new(InMemoryJobStore::new()),
            Duration::from_secs(20),
        );
        tokio::time::sleep(Duration::from_secs(66)).await;
        assert_eq!(heartbeat.stop().await, 3);

        let seen: Vec<u64> = sink.seen.lock().await.iter().map(Duration::as_secs).collect();
        assert_eq!(seen, vec![20, 40, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_aborts_the_task() {
        let log = Arc::new(InMemoryEventLog::new());
        let job = Job::new("j-1", "render", json!({}));

        let heartbeat = Heartbeat::start(
            job,
            "w-1".into(),
            log.clone(),
            Arc::new(InMemoryJobStore::new()),
            Duration::from_secs(1),
        );
        drop(heartbeat);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(log.is_empty().await);
    }
}
