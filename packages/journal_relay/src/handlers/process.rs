use axum::{Json, response::IntoResponse};
use serde_json::{Map, Value, json};

/// Accept any JSON object and echo it back. Nothing is processed yet; the
/// endpoint exists so clients can wire against the final route.
pub async fn process_input(Json(data): Json<Map<String, Value>>) -> impl IntoResponse {
    Json(json!({
        "message": "Input processed successfully",
        "data": data,
    }))
}
