use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::warn;

use crate::AppState;

/// Proxy a conversation lookup to the upstream history API.
///
/// Always answers 200: failures come back as a structured `{"error": ..}`
/// body, which existing clients branch on.
pub async fn get_conversation_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    match state.history.fetch_conversation(&conversation_id).await {
        Ok(body) => {
            state.metrics.history_requested(true);
            Json(body)
        }
        Err(e) => {
            warn!(conversation = %conversation_id, "Conversation history lookup failed: {}", e);
            state.metrics.history_requested(false);
            Json(e.to_body())
        }
    }
}
