//! Turn a [`WorkerConfig`] into a ready-to-run [`WorkerLoop`].

use std::sync::Arc;

use jobline_core::lease::{EventSink, JobLease};
use jobline_core::notify::{DisabledNotifier, Notifier};
use jobline_db::PgJobStore;
use jobline_events::{ChatNotifier, QueueClient};

use crate::config::{LeaseBackendConfig, WorkerConfig};
use crate::error::WorkerError;
use crate::executor::Executor;
use crate::handlers::CallOutHandler;
use crate::worker_loop::WorkerLoop;

/// Lease and event sink halves of one backend.
pub struct Backend {
    pub lease: Arc<dyn JobLease>,
    pub sink: Arc<dyn EventSink>,
}

/// Connect the configured lease backend.
///
/// Store mode without `DATABASE_URL` still starts: the store logs once and
/// never hands out work.
pub async fn connect_backend(config: &LeaseBackendConfig) -> Result<Backend, WorkerError> {
    match config {
        LeaseBackendConfig::Queue(queue) => {
            tracing::info!(
                next_job_url = %queue.next_job_url,
                event_url = %queue.event_url,
                "Using queue service"
            );
            let client = Arc::new(QueueClient::new(queue.clone()));
            Ok(Backend {
                lease: client.clone(),
                sink: client,
            })
        }
        LeaseBackendConfig::Store { database_url, timeout } => {
            let store = match database_url {
                Some(url) => {
                    let pool = jobline_db::create_pool(url).await?;
                    jobline_db::run_migrations(&pool).await?;
                    tracing::info!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Using PostgreSQL job store"
                    );
                    PgJobStore::new(pool).with_timeout(*timeout)
                }
                None => PgJobStore::unconfigured(),
            };
            let store = Arc::new(store);
            Ok(Backend {
                lease: store.clone(),
                sink: store,
            })
        }
    }
}

/// Register built-in handlers. Each `CALL_OUT_<TYPE>_URL` becomes a
/// [`CallOutHandler`] for `<type>`.
pub fn build_executor(config: &WorkerConfig) -> Executor {
    let client = reqwest::Client::new();
    let mut executor = Executor::new();
    for (job_type, url) in &config.call_outs {
        executor.register(
            job_type.clone(),
            CallOutHandler::with_client(client.clone(), url.clone(), config.call_out_timeout),
        );
    }
    executor
}

pub fn build_notifier(config: &WorkerConfig) -> Arc<dyn Notifier> {
    if config.notify.has_any_token() {
        Arc::new(ChatNotifier::new(config.notify.clone()))
    } else {
        tracing::info!("No notification tokens configured; notifications disabled");
        Arc::new(DisabledNotifier)
    }
}

/// Wire everything from configuration.
pub async fn build_worker(
    config: &WorkerConfig,
    executor: Executor,
) -> Result<WorkerLoop, WorkerError> {
    let backend = connect_backend(&config.backend).await?;
    Ok(WorkerLoop::new(
        config.identity(),
        backend.lease,
        backend.sink,
        Arc::new(executor),
        build_notifier(config),
        config.loop_config.clone(),
    ))
}
