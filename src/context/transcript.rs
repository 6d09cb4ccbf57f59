//! The transcript port and an in-memory implementation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::warn;
use uuid::Uuid;

use crate::types::{TranscriptMessage, TranscriptMutation};

/// Receives every transcript change made by a query.
///
/// Calls are synchronous and happen in the order the engine produces them.
/// Implementations that feed a UI decide how to marshal onto their own
/// context.
pub trait TranscriptSink: Send + Sync {
    fn apply(&self, conversation_id: &str, mutation: TranscriptMutation);
}

/// Transcript kept in memory, keyed by conversation.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    conversations: Mutex<HashMap<String, Vec<TranscriptMessage>>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a conversation's messages.
    pub fn messages(&self, conversation_id: &str) -> Vec<TranscriptMessage> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn message(&self, conversation_id: &str, id: Uuid) -> Option<TranscriptMessage> {
        self.messages(conversation_id)
            .into_iter()
            .find(|m| m.id == id)
    }
}

impl TranscriptSink for MemoryTranscript {
    fn apply(&self, conversation_id: &str, mutation: TranscriptMutation) {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let messages = conversations.entry(conversation_id.to_string()).or_default();
        match mutation {
            TranscriptMutation::Append(message) => messages.push(message),
            TranscriptMutation::Update { message_id, change } => {
                match messages.iter_mut().find(|m| m.id == message_id) {
                    Some(message) => message.apply(&change),
                    None => warn!(conversation_id, %message_id, "Update for unknown transcript message"),
                }
            }
        }
    }
}
