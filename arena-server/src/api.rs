//! HTTP status API
//!
//! Read-only view of the running server:
//! - `GET /health`: liveness
//! - `GET /status`: per-instance status table as JSON
//! - `GET /metrics`: Prometheus text
//! - `GET /metrics/json`: JSON metrics

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::metrics::ServerMetrics;
use crate::supervisor::{SharedStatus, StatusTable};

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Supervisor's instance table
    pub status: SharedStatus,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    total_players: usize,
    #[serde(flatten)]
    table: StatusTable,
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    let table = state.status.read().clone();
    Json(StatusResponse {
        total_players: table.total_players(),
        table,
    })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_handler))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .with_state(state)
}

/// Serve the status API until `shutdown` flips
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status API listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
