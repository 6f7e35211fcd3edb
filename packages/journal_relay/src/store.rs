use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// One timestamped utterance in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    /// Usually `user` or `assistant`, but any label is kept as-is.
    pub speaker: String,
    pub timestamp: DateTime<Utc>,
}

/// Journal text plus transcript log for a single conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub content: String,
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            content: String::new(),
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-memory conversation state, keyed by the caller-supplied conversation id.
///
/// Records live for the lifetime of the process. Nothing is ever evicted, so
/// memory grows with the number of distinct conversation ids seen.
#[derive(Debug, Default)]
pub struct ConversationStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored record for `conversation_id`, or a fresh empty one.
    ///
    /// The fresh record is not inserted; reads never create state.
    pub async fn get(&self, conversation_id: &str) -> ConversationRecord {
        let records = self.records.read().await;
        records
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| ConversationRecord::empty(Utc::now()))
    }

    /// Stored record for `conversation_id`, if one exists.
    pub async fn find(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.records.read().await.get(conversation_id).cloned()
    }

    /// Overwrite the journal text (last write wins).
    pub async fn set_content(
        &self,
        conversation_id: &str,
        content: String,
        timestamp: DateTime<Utc>,
    ) {
        let mut records = self.records.write().await;
        let record = Self::entry(&mut records, conversation_id);
        debug!(
            conversation = %conversation_id,
            len = content.len(),
            "Journal content replaced"
        );
        record.content = content;
        record.updated_at = timestamp;
    }

    /// Append one entry to the transcript. Returns the new transcript length.
    pub async fn append_transcript(
        &self,
        conversation_id: &str,
        entry: TranscriptEntry,
    ) -> usize {
        let mut records = self.records.write().await;
        let record = Self::entry(&mut records, conversation_id);
        record.updated_at = entry.timestamp;
        record.transcript.push(entry);
        record.transcript.len()
    }

    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.records.read().await.contains_key(conversation_id)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    fn entry<'a>(
        records: &'a mut HashMap<String, ConversationRecord>,
        conversation_id: &str,
    ) -> &'a mut ConversationRecord {
        records
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationRecord::empty(Utc::now()))
    }
}
