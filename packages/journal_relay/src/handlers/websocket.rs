use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Realtime journal channel. Every connection starts in no room.
pub async fn journal_websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let store = state.store.clone();
    let rooms = state.rooms.clone();
    let metrics = state.metrics.clone();

    ws.on_upgrade(move |socket| ws::handle_journal_ws(socket, store, rooms, metrics))
}
