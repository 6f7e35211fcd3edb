use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::AppState;
use crate::store::TranscriptEntry;

/// Body of `POST /api/journal/{conversation_id}`. Clients also send a
/// `conversation_id` field; it is ignored in favor of the path id.
#[derive(Deserialize)]
pub struct JournalUpdateRequest {
    content: String,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct TranscriptUpdateRequest {
    text: String,
    speaker: String,
    timestamp: DateTime<Utc>,
}

pub async fn get_journal(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    Json(state.store.get(&conversation_id).await)
}

/// Replace the journal text. REST writes are not pushed to realtime rooms.
pub async fn update_journal(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<JournalUpdateRequest>,
) -> impl IntoResponse {
    state
        .store
        .set_content(&conversation_id, req.content, req.timestamp)
        .await;
    state.metrics.journal_updated();
    Json(json!({ "success": true }))
}

pub async fn append_transcript(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<TranscriptUpdateRequest>,
) -> impl IntoResponse {
    let entry = TranscriptEntry {
        text: req.text,
        speaker: req.speaker,
        timestamp: req.timestamp,
    };
    let len = state.store.append_transcript(&conversation_id, entry).await;
    state.metrics.transcript_appended();
    debug!(conversation = %conversation_id, len, "Transcript entry appended over REST");
    Json(json!({ "success": true }))
}
