use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;

/// Health check endpoint - fixed payload while the process is serving
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Journal relay is running",
    }))
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let conversations = state.store.len().await;
    Json(state.metrics.snapshot(conversations))
}
