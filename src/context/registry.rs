//! Registry of in-flight queries.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Tracks cancellation tokens per conversation and the set of busy queries.
///
/// Shared by the engine and every [`ExecutionScope`](super::ExecutionScope)
/// it opens. A UI stop action calls [`cancel_conversation`](Self::cancel_conversation).
#[derive(Debug, Default)]
pub struct QueryRegistry {
    tokens: Mutex<HashMap<String, Vec<(Uuid, CancellationToken)>>>,
    tasks: Mutex<HashSet<Uuid>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conversation_id: &str, query_id: Uuid, token: CancellationToken) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(conversation_id.to_string())
            .or_default()
            .push((query_id, token));
    }

    /// Remove a query's token. Returns whether it was present.
    pub fn unregister(&self, conversation_id: &str, query_id: Uuid) -> bool {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = tokens.get_mut(conversation_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != query_id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            tokens.remove(conversation_id);
        }
        removed
    }

    /// Cancel every query running in a conversation. Returns how many were signalled.
    pub fn cancel_conversation(&self, conversation_id: &str) -> usize {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = tokens.get(conversation_id) else {
            return 0;
        };
        for (_, token) in entries {
            token.cancel();
        }
        debug!(conversation_id, count = entries.len(), "Cancelled conversation queries");
        entries.len()
    }

    /// Number of queries registered for a conversation.
    pub fn active_queries(&self, conversation_id: &str) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .map_or(0, Vec::len)
    }

    /// Total registered tokens across all conversations.
    pub fn token_count(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn begin_task(&self, query_id: Uuid) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query_id);
    }

    pub fn end_task(&self, query_id: Uuid) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&query_id)
    }

    pub fn is_busy(&self, query_id: Uuid) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&query_id)
    }

    /// Number of queries currently marked busy.
    pub fn busy_count(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
