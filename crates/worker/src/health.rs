use std::net::SocketAddr;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::worker_loop::{LoopState, StatusSnapshot, WorkerStatus};

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` while the loop runs, `stopped` after shutdown.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    #[serde(flatten)]
    pub worker: StatusSnapshot,
}

/// GET /health -- returns loop state and job counters.
async fn health_check(State(status): State<WorkerStatus>) -> Json<HealthResponse> {
    let worker = status.snapshot().await;
    let status = if worker.state == LoopState::Stopped {
        "stopped"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        worker,
    })
}

pub fn router(status: WorkerStatus) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(status)
}

/// Serve `/health` on `0.0.0.0:{port}` until `cancel` fires.
pub async fn serve(
    port: u16,
    status: WorkerStatus,
    cancel: CancellationToken,
) -> Result<(), WorkerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Health endpoint listening");

    axum::serve(listener, router(status))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

/// Wait for the spawned health task. Returns `false`, after logging, when
/// the task panicked or was aborted.
pub async fn join(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health task ended abnormally");
            false
        }
    }
}
