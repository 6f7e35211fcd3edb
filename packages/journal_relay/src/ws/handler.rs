//! WebSocket Handler
//!
//! One task per connection: a writer draining the connection's outbox into the
//! socket and a reader feeding parsed frames to the dispatcher.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;
use crate::store::ConversationStore;

use super::dispatch::{ConnectionContext, dispatch_client_message, disconnect_cleanup};
use super::protocol::{ClientMessage, ServerMessage};
use super::rooms::{ConnectionId, RoomRegistry};

/// Handle a realtime journal connection until the client goes away.
pub async fn handle_journal_ws(
    socket: WebSocket,
    store: Arc<ConversationStore>,
    rooms: Arc<RoomRegistry>,
    metrics: Arc<ServerMetrics>,
) {
    let connection_id = ConnectionId::new();
    info!(conn_id = %connection_id, "New journal WebSocket connection");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbox for everything addressed to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    rooms.register(connection_id, tx).await;
    let open = rooms.connection_count().await;
    debug!(conn_id = %connection_id, open, "Outbox registered");

    let ctx = ConnectionContext::new(connection_id, store, rooms, metrics.clone());

    // Task to send messages to WebSocket
    let metrics_sender = metrics.clone();
    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                debug!(conn_id = %connection_id, "WebSocket send failed: {}", e);
                metrics_sender.websocket_error();
                break;
            }
        }
    };

    // Task to handle incoming messages
    let metrics_input = metrics.clone();
    let input_task = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics_input.event_received();
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            dispatch_client_message(&ctx, client_msg).await;
                        }
                        Err(e) => {
                            debug!(conn_id = %connection_id, "Ignoring unparseable frame: {}", e);
                            metrics_input.event_ignored();
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(conn_id = %connection_id, "Client sent close frame");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    debug!(conn_id = %connection_id, "Ignoring binary frame");
                    metrics_input.event_received();
                    metrics_input.event_ignored();
                }
                // Ping/pong are answered by axum
                Ok(_) => {}
                Err(e) => {
                    warn!(conn_id = %connection_id, "WebSocket receive error: {}", e);
                    metrics_input.websocket_error();
                    break;
                }
            }
        }
    };

    // Whichever side finishes first ends the connection
    tokio::select! {
        _ = sender_task => {},
        _ = input_task => {},
    }

    disconnect_cleanup(&ctx).await;
    metrics.connection_closed();
    info!(conn_id = %connection_id, "Journal WebSocket connection closed");
}
