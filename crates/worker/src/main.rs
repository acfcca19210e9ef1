//! `jobline-worker` -- leased background job worker.
//!
//! See [`WorkerConfig::from_env`] for the environment variables it reads.

use anyhow::Context;
use jobline_worker::app;
use jobline_worker::health;
use jobline_worker::WorkerConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        worker_id = %config.worker_id,
        capabilities = ?config.capabilities,
        "Starting jobline-worker"
    );

    let executor = app::build_executor(&config);
    let worker = app::build_worker(&config, executor)
        .await
        .context("Failed to initialise lease backend")?;

    let cancel = CancellationToken::new();

    let health_handle = config.health_port.map(|port| {
        let status = worker.status();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(port, status, cancel).await {
                tracing::error!(error = %e, port, "Health endpoint failed");
            }
        })
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    worker.run(cancel.clone()).await;

    cancel.cancel();
    if let Some(handle) = health_handle {
        health::join(handle).await;
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobline_worker=info,jobline_events=info,jobline_db=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM. The in-flight job, if any, still finishes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing current job before exit");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current job before exit");
        }
    }
}
