// src/server/metrics_server.rs

use crate::core::kv::KvBus;
use crate::core::metrics::gather_metrics;
use crate::core::state::OperatorState;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Handles HTTP requests to the `/metrics` endpoint (§2 ambient stack).
async fn metrics_handler<B: KvBus>(_state: Arc<OperatorState<B>>) -> impl IntoResponse {
    let body = gather_metrics();
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}

/// Runs a simple HTTP server exposing Prometheus metrics on `/metrics`.
pub async fn run_metrics_server<B: KvBus + 'static>(state: Arc<OperatorState<B>>) {
    let port = {
        let config = state.config.lock().await;
        config.metrics.port
    };

    let app = Router::new().route("/metrics", get(move || metrics_handler(state.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on port {}: {}", port, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("metrics server exited: {e}");
    }
}
