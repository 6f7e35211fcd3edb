//! Realtime event dispatcher.
//!
//! Applies one `ClientMessage` from a connection to the conversation store and
//! fans the result out through the room registry. Kept apart from the socket
//! loop in `handler.rs` so it can be driven directly with in-memory outboxes.
//!
//! Events with missing or empty required fields are dropped without telling
//! the sender.
//!
//! A store change and its fan-out happen under the conversation's turn lock,
//! as do a join and its snapshot. Room members therefore see changes in store
//! order, and a joiner never receives an entry twice.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics::ServerMetrics;
use crate::store::{ConversationStore, TranscriptEntry};

use super::protocol::{ClientMessage, ServerMessage};
use super::rooms::{ConnectionId, RoomRegistry};

/// Per-connection context shared between the socket loop and the dispatcher.
pub(crate) struct ConnectionContext {
    pub connection_id: ConnectionId,
    pub store: Arc<ConversationStore>,
    pub rooms: Arc<RoomRegistry>,
    pub metrics: Arc<ServerMetrics>,
}

impl ConnectionContext {
    pub(crate) fn new(
        connection_id: ConnectionId,
        store: Arc<ConversationStore>,
        rooms: Arc<RoomRegistry>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            connection_id,
            store,
            rooms,
            metrics,
        }
    }
}

/// Result of dispatching a `ClientMessage`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchResult {
    Handled,
    /// Required fields were missing or empty; nothing changed.
    Ignored(&'static str),
}

/// Treat `None` and `Some("")` alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Dispatch a single `ClientMessage` on behalf of `ctx.connection_id`.
pub(crate) async fn dispatch_client_message(
    ctx: &ConnectionContext,
    msg: ClientMessage,
) -> DispatchResult {
    let event = msg.name();
    match msg {
        ClientMessage::JoinConversation { conversation_id } => {
            let Some(conversation_id) = present(conversation_id) else {
                return ignored(ctx, event);
            };
            join_conversation(ctx, conversation_id).await
        }
        ClientMessage::LeaveConversation { conversation_id } => {
            let Some(conversation_id) = present(conversation_id) else {
                return ignored(ctx, event);
            };
            if ctx.rooms.leave(ctx.connection_id, &conversation_id).await {
                let remaining = ctx.rooms.rooms_for(ctx.connection_id).await;
                debug!(
                    conn_id = %ctx.connection_id,
                    conversation = %conversation_id,
                    ?remaining,
                    "Left conversation"
                );
            }
            DispatchResult::Handled
        }
        ClientMessage::JournalUpdate {
            conversation_id,
            content,
        } => {
            // Empty content is a legitimate "cleared the journal" update.
            let (Some(conversation_id), Some(content)) = (present(conversation_id), content)
            else {
                return ignored(ctx, event);
            };
            journal_update(ctx, conversation_id, content).await
        }
        ClientMessage::TranscriptUpdate {
            conversation_id,
            text,
            speaker,
        } => {
            let (Some(conversation_id), Some(text), Some(speaker)) =
                (present(conversation_id), present(text), present(speaker))
            else {
                return ignored(ctx, event);
            };
            transcript_update(ctx, conversation_id, text, speaker).await
        }
    }
}

fn ignored(ctx: &ConnectionContext, event: &'static str) -> DispatchResult {
    debug!(conn_id = %ctx.connection_id, event, "Ignoring event with missing fields");
    ctx.metrics.event_ignored();
    DispatchResult::Ignored(event)
}

async fn join_conversation(ctx: &ConnectionContext, conversation_id: String) -> DispatchResult {
    let _turn = ctx.rooms.turn(&conversation_id).await;
    ctx.rooms.join(ctx.connection_id, &conversation_id).await;
    let members = ctx.rooms.room_size(&conversation_id).await;
    info!(
        conn_id = %ctx.connection_id,
        conversation = %conversation_id,
        members,
        "Joined conversation"
    );

    // Unknown conversations get no initial state; the client starts empty.
    if let Some(record) = ctx.store.find(&conversation_id).await {
        let delivery = ctx
            .rooms
            .send_to(
                ctx.connection_id,
                ServerMessage::JournalInitial {
                    conversation_id,
                    content: record.content,
                    transcript: record.transcript,
                },
            )
            .await;
        ctx.metrics.record_delivery(delivery);
    }
    DispatchResult::Handled
}

async fn journal_update(
    ctx: &ConnectionContext,
    conversation_id: String,
    content: String,
) -> DispatchResult {
    let _turn = ctx.rooms.turn(&conversation_id).await;
    ctx.store
        .set_content(&conversation_id, content.clone(), Utc::now())
        .await;
    ctx.metrics.journal_updated();

    let message = ServerMessage::JournalUpdated {
        conversation_id,
        content,
    };
    let delivery = ctx
        .rooms
        .broadcast(message.conversation_id(), &message, Some(ctx.connection_id))
        .await;
    ctx.metrics.record_delivery(delivery);
    DispatchResult::Handled
}

async fn transcript_update(
    ctx: &ConnectionContext,
    conversation_id: String,
    text: String,
    speaker: String,
) -> DispatchResult {
    let _turn = ctx.rooms.turn(&conversation_id).await;
    let entry = TranscriptEntry {
        text,
        speaker,
        timestamp: Utc::now(),
    };
    ctx.store
        .append_transcript(&conversation_id, entry.clone())
        .await;
    ctx.metrics.transcript_appended();

    // The author receives its own entry back, unlike journal updates.
    let message = ServerMessage::TranscriptUpdated {
        conversation_id,
        entry,
    };
    let delivery = ctx
        .rooms
        .broadcast(message.conversation_id(), &message, None)
        .await;
    ctx.metrics.record_delivery(delivery);
    DispatchResult::Handled
}

/// Clean up connection state on disconnect.
pub(crate) async fn disconnect_cleanup(ctx: &ConnectionContext) {
    let left = ctx.rooms.unregister(ctx.connection_id).await;
    if !left.is_empty() {
        debug!(conn_id = %ctx.connection_id, rooms = ?left, "Removed from rooms on disconnect");
    }
}
