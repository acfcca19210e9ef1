//! Shared fixtures for the HTTP client tests: a throwaway axum server on a
//! random local port that records what it receives.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// One request as seen by the fake service.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: serde_json::Value,
}

/// Requests captured by a fixture server, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    pub async fn record(&self, path: &str, headers: &HeaderMap, body: serde_json::Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.inner.lock().await.push(Recorded {
            path: path.to_string(),
            authorization: header("authorization"),
            idempotency_key: header("idempotency-key"),
            body,
        });
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().await.clone()
    }
}

/// Serve `app` on `127.0.0.1:0` and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
