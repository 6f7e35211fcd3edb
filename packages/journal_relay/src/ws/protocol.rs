//! WebSocket Protocol Types
//!
//! Every frame is a JSON text frame shaped `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::store::TranscriptEntry;

/// Messages sent FROM the client TO the server.
///
/// Every field is optional at the wire level so that a frame with a missing
/// field still parses; the dispatcher decides what counts as usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a conversation's room and receive its current state
    JoinConversation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    /// Unsubscribe from one conversation's room, keeping the connection open
    LeaveConversation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    /// Replace the journal text. An empty `content` is a real update;
    /// only an absent one is ignored.
    JournalUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Append one utterance to the transcript
    TranscriptUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker: Option<String>,
    },
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::JoinConversation { .. } => "join_conversation",
            ClientMessage::LeaveConversation { .. } => "leave_conversation",
            ClientMessage::JournalUpdate { .. } => "journal_update",
            ClientMessage::TranscriptUpdate { .. } => "transcript_update",
        }
    }
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current state of a conversation, sent only to the connection that joined
    JournalInitial {
        conversation_id: String,
        content: String,
        transcript: Vec<TranscriptEntry>,
    },
    /// Journal text changed (never echoed to the author)
    JournalUpdated {
        conversation_id: String,
        content: String,
    },
    /// A transcript entry was appended (echoed to the author too)
    TranscriptUpdated {
        conversation_id: String,
        entry: TranscriptEntry,
    },
}

impl ServerMessage {
    pub fn conversation_id(&self) -> &str {
        match self {
            ServerMessage::JournalInitial {
                conversation_id, ..
            }
            | ServerMessage::JournalUpdated {
                conversation_id, ..
            }
            | ServerMessage::TranscriptUpdated {
                conversation_id, ..
            } => conversation_id,
        }
    }
}
