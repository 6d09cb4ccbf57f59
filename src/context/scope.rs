//! Per-query execution scope.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::cancellation::QueryCancellation;
use super::registry::QueryRegistry;
use super::transcript::TranscriptSink;
use crate::engine::events::{QueryEventEmitter, QueryEventPayload, QueryEventSink, QueryStatus};
use crate::models::Protocol;
use crate::types::{
    MessageMutation, MessageStatus, ResultAttachment, TranscriptMessage, TranscriptMutation,
};

/// Shared collaborators a scope registers with.
#[derive(Clone)]
pub struct ScopeServices {
    pub registry: Arc<QueryRegistry>,
    pub transcript: Arc<dyn TranscriptSink>,
    pub events: Option<QueryEventSink>,
}

/// Owns everything a single query allocates.
///
/// Opening registers the cancellation token and busy task and appends the
/// placeholder assistant message. [`retire`](Self::retire) undoes the
/// registrations exactly once; dropping an unretired scope retires it as
/// [`QueryStatus::Abandoned`].
pub struct ExecutionScope {
    query_id: Uuid,
    conversation_id: String,
    cancellation: QueryCancellation,
    registry: Arc<QueryRegistry>,
    transcript: Arc<dyn TranscriptSink>,
    emitter: QueryEventEmitter,
    placeholder: TranscriptMessage,
    appended: Vec<TranscriptMessage>,
    retired: bool,
}

impl ExecutionScope {
    pub fn open(
        services: ScopeServices,
        conversation_id: impl Into<String>,
        model: &str,
        protocol: Protocol,
        timeout: Duration,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let query_id = Uuid::new_v4();
        let cancellation = QueryCancellation::new(timeout);

        services
            .registry
            .register(&conversation_id, query_id, cancellation.token().clone());
        services.registry.begin_task(query_id);

        let placeholder = TranscriptMessage::placeholder();
        services
            .transcript
            .apply(&conversation_id, TranscriptMutation::Append(placeholder.clone()));

        let emitter = QueryEventEmitter::new(query_id, conversation_id.clone(), services.events);
        emitter.emit(QueryEventPayload::Started {
            model: model.to_string(),
            protocol,
        });
        debug!(%query_id, conversation_id = conversation_id.as_str(), model, "Query scope opened");

        Self {
            query_id,
            conversation_id,
            cancellation,
            registry: services.registry,
            transcript: services.transcript,
            emitter,
            placeholder,
            appended: Vec::new(),
            retired: false,
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn cancellation(&self) -> &QueryCancellation {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Local mirror of the placeholder message.
    pub fn placeholder(&self) -> &TranscriptMessage {
        &self.placeholder
    }

    /// Messages appended after the placeholder.
    pub fn appended(&self) -> &[TranscriptMessage] {
        &self.appended
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Apply a change to the placeholder and forward it to the transcript.
    pub fn update(&mut self, change: MessageMutation) {
        self.placeholder.apply(&change);
        self.transcript.apply(
            &self.conversation_id,
            TranscriptMutation::Update {
                message_id: self.placeholder.id,
                change,
            },
        );
    }

    /// Forward a streamed text delta. The first delta clears the thinking status.
    pub fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.clear_status();
        self.update(MessageMutation::AppendBody(text.to_string()));
    }

    pub fn attach(&mut self, attachment: ResultAttachment) {
        self.update(MessageMutation::AddAttachment(attachment));
    }

    pub fn mark_automated(&mut self) {
        self.update(MessageMutation::MarkAutomated);
    }

    pub fn touch(&mut self) {
        self.update(MessageMutation::Touch(Utc::now()));
    }

    pub fn clear_status(&mut self) {
        if self.placeholder.status.is_some() {
            self.update(MessageMutation::SetStatus(None));
        }
    }

    /// Append a new message after the placeholder.
    pub fn append_message(&mut self, message: TranscriptMessage) {
        self.transcript
            .apply(&self.conversation_id, TranscriptMutation::Append(message.clone()));
        self.appended.push(message);
    }

    pub(crate) fn emit(&self, payload: QueryEventPayload) {
        self.emitter.emit(payload);
    }

    /// Release registrations and fire the completion event. Idempotent.
    pub fn retire(&mut self, status: QueryStatus) {
        if self.retired {
            return;
        }
        self.retired = true;

        self.registry.unregister(&self.conversation_id, self.query_id);
        self.registry.end_task(self.query_id);
        if self.placeholder.status == Some(MessageStatus::Thinking) {
            self.update(MessageMutation::SetStatus(None));
        }

        debug!(query_id = %self.query_id, ?status, "Query scope retired");
        self.emitter.emit(QueryEventPayload::Completed { status });
    }
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        self.retire(QueryStatus::Abandoned);
    }
}

impl std::fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("query_id", &self.query_id)
            .field("conversation_id", &self.conversation_id)
            .field("retired", &self.retired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryTranscript;
    use crate::engine::events::QueryEvent;
    use std::sync::Mutex;

    struct Fixture {
        registry: Arc<QueryRegistry>,
        transcript: Arc<MemoryTranscript>,
        events: Arc<Mutex<Vec<QueryEvent>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(QueryRegistry::new()),
                transcript: Arc::new(MemoryTranscript::new()),
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn open(&self) -> ExecutionScope {
            let events = self.events.clone();
            let services = ScopeServices {
                registry: self.registry.clone(),
                transcript: self.transcript.clone(),
                events: Some(Arc::new(move |e: QueryEvent| events.lock().unwrap().push(e))),
            };
            ExecutionScope::open(services, "conv", "gpt-4o", Protocol::Chat, Duration::from_secs(60))
        }

        fn completions(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e.payload, QueryEventPayload::Completed { .. }))
                .count()
        }
    }

    #[test]
    fn open_registers_and_appends_placeholder() {
        let fx = Fixture::new();
        let scope = fx.open();

        assert_eq!(fx.registry.active_queries("conv"), 1);
        assert!(fx.registry.is_busy(scope.query_id()));
        let messages = fx.transcript.messages("conv");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, Some(MessageStatus::Thinking));
        assert_eq!(messages[0].id, scope.placeholder().id);
    }

    #[test]
    fn first_delta_clears_thinking() {
        let fx = Fixture::new();
        let mut scope = fx.open();
        scope.append_text("");
        assert_eq!(scope.placeholder().status, Some(MessageStatus::Thinking));

        scope.append_text("Hel");
        scope.append_text("lo");
        let stored = fx.transcript.message("conv", scope.placeholder().id).unwrap();
        assert_eq!(stored.body, "Hello");
        assert_eq!(stored.status, None);
    }

    #[test]
    fn retire_runs_once() {
        let fx = Fixture::new();
        let mut scope = fx.open();
        scope.retire(QueryStatus::Completed);
        scope.retire(QueryStatus::Cancelled);
        drop(scope);

        assert_eq!(fx.completions(), 1);
        assert_eq!(fx.registry.token_count(), 0);
        assert_eq!(fx.registry.busy_count(), 0);
    }

    #[test]
    fn drop_retires_as_abandoned() {
        let fx = Fixture::new();
        let scope = fx.open();
        let id = scope.placeholder().id;
        drop(scope);

        let events = fx.events.lock().unwrap();
        assert!(matches!(
            events.last().map(|e| &e.payload),
            Some(QueryEventPayload::Completed { status: QueryStatus::Abandoned })
        ));
        assert_eq!(fx.registry.token_count(), 0);
        assert_eq!(fx.transcript.message("conv", id).unwrap().status, None);
    }
}
