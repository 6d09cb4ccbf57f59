//! Query lifecycle events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Protocol;

/// How a query ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueryStatus {
    Completed,
    Cancelled,
    Failed { error: String },
    /// The query future was dropped before it finished.
    Abandoned,
}

/// Concrete event payloads emitted during a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEventPayload {
    Started { model: String, protocol: Protocol },
    FunctionsDispatched { count: usize },
    Completed { status: QueryStatus },
}

/// A single event with its correlation data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryEvent {
    pub query_id: Uuid,
    pub conversation_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: QueryEventPayload,
}

/// Callback receiving query events.
pub type QueryEventSink = Arc<dyn Fn(QueryEvent) + Send + Sync>;

pub(crate) struct QueryEventEmitter {
    query_id: Uuid,
    conversation_id: String,
    seq: AtomicU64,
    sink: Option<QueryEventSink>,
}

impl QueryEventEmitter {
    pub(crate) fn new(query_id: Uuid, conversation_id: String, sink: Option<QueryEventSink>) -> Self {
        Self {
            query_id,
            conversation_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: QueryEventPayload) {
        let Some(sink) = &self.sink else { return; };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(QueryEvent {
            query_id: self.query_id,
            conversation_id: self.conversation_id.clone(),
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emitter_numbers_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: QueryEventSink = Arc::new(move |event: QueryEvent| sink_seen.lock().unwrap().push(event));

        let emitter = QueryEventEmitter::new(Uuid::new_v4(), "conv".into(), Some(sink));
        emitter.emit(QueryEventPayload::Started {
            model: "gpt-4o".into(),
            protocol: Protocol::Chat,
        });
        emitter.emit(QueryEventPayload::Completed {
            status: QueryStatus::Completed,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(seen[1].conversation_id, "conv");
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_value(QueryStatus::Failed { error: "boom".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "error": "boom"}));
    }
}
