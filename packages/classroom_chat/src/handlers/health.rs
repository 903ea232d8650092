use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns router status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        connections: snapshot.connections.active,
        online: state.registry.len().await,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed router metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Identities that currently have an open chat channel
pub async fn online_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "online": state.registry.online().await }))
}
