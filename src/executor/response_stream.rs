//! Response-protocol streaming.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use super::{error_text, response_request, ExecutionOutput, Executor};
use crate::context::ExecutionScope;
use crate::error::{QueryError, Result};
use crate::provider::{ChatRequest, ResponseProvider};
use crate::types::{ResponseStreamUpdate, StructuralSignal, TextContribution};

/// Accumulates answer text from response-protocol updates.
#[derive(Debug, Default)]
pub struct ResponseStreamAggregator {
    answer: String,
    function_calls: usize,
    unrecognized: usize,
}

impl ResponseStreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn into_answer(self) -> String {
        self.answer
    }

    /// Function-call items announced by the stream.
    pub fn function_calls(&self) -> usize {
        self.function_calls
    }

    pub fn unrecognized(&self) -> usize {
        self.unrecognized
    }

    /// Fold one update in. Returns the text it added.
    ///
    /// A snapshot only contributes when it extends the current answer; the
    /// new suffix is returned.
    pub fn ingest(&mut self, update: &ResponseStreamUpdate) -> Option<String> {
        let classified = update.classify();

        match &classified.signal {
            Some(StructuralSignal::Unrecognized(description)) => {
                self.unrecognized += 1;
                debug!(description = description.as_str(), "Ignoring response update");
            }
            Some(StructuralSignal::ItemAdded { kind }) if kind == "function_call" => {
                self.function_calls += 1;
            }
            _ => {}
        }

        match classified.text? {
            TextContribution::Snapshot(text) => {
                if text.len() > self.answer.len() && text.starts_with(&self.answer) {
                    let suffix = text[self.answer.len()..].to_string();
                    self.answer = text;
                    Some(suffix)
                } else {
                    None
                }
            }
            TextContribution::Fragment(text) if text.is_empty() => None,
            TextContribution::Fragment(text) => {
                self.answer.push_str(&text);
                Some(text)
            }
        }
    }

    /// Append a failure as visible text after any partial answer.
    pub fn append_error(&mut self, error: &QueryError) -> String {
        let mut added = String::new();
        if !self.answer.is_empty() {
            added.push_str("\n\n");
        }
        added.push_str(&error_text(error));
        self.answer.push_str(&added);
        added
    }
}

/// Streams a response request. Failures become in-band error text; the
/// executor never returns tool calls.
pub struct ResponseStreamExecutor {
    provider: Arc<dyn ResponseProvider>,
}

impl ResponseStreamExecutor {
    pub fn new(provider: Arc<dyn ResponseProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Executor for ResponseStreamExecutor {
    async fn execute(
        &self,
        request: &ChatRequest,
        scope: &mut ExecutionScope,
    ) -> Result<ExecutionOutput> {
        let cancellation = scope.cancellation().clone();
        let request = response_request(request);
        debug!(model = request.model.as_str(), "Response stream");

        let mut aggregator = ResponseStreamAggregator::new();
        let opened = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Ok(ExecutionOutput::default()),
            opened = self.provider.stream_response(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(model = request.model.as_str(), error = %e, "Response stream failed to open");
                let added = aggregator.append_error(&e);
                scope.append_text(&added);
                return Ok(ExecutionOutput {
                    answer: aggregator.into_answer(),
                    tool_calls: Vec::new(),
                });
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!(query_id = %scope.query_id(), "Response stream cancelled");
                    break;
                }
                next = stream.next() => match next {
                    None => break,
                    Some(Ok(update)) => {
                        if let Some(added) = aggregator.ingest(&update) {
                            scope.append_text(&added);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(model = request.model.as_str(), error = %e, "Response stream failed");
                        let added = aggregator.append_error(&e);
                        scope.append_text(&added);
                        break;
                    }
                },
            }
        }

        if aggregator.function_calls() > 0 {
            warn!(
                count = aggregator.function_calls(),
                "Response stream requested function calls; they are not dispatched"
            );
        }

        Ok(ExecutionOutput {
            answer: aggregator.into_answer(),
            tool_calls: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseOutputContent, ResponseOutputItem, ResponseResult};
    use serde_json::json;

    fn snapshot(text: &str) -> ResponseResult {
        ResponseResult {
            id: "resp_1".into(),
            status: Some("in_progress".into()),
            output: vec![ResponseOutputItem::Message {
                id: Some("msg_1".into()),
                content: vec![ResponseOutputContent::OutputText { text: text.into() }],
            }],
        }
    }

    fn delta(text: &str) -> ResponseStreamUpdate {
        ResponseStreamUpdate::OutputTextDelta {
            item_id: "msg_1".into(),
            delta: text.into(),
        }
    }

    #[test]
    fn deltas_append() {
        let mut aggregator = ResponseStreamAggregator::new();
        assert_eq!(aggregator.ingest(&delta("Hel")), Some("Hel".into()));
        assert_eq!(aggregator.ingest(&delta("")), None);
        assert_eq!(aggregator.ingest(&delta("lo")), Some("lo".into()));
        assert_eq!(aggregator.answer(), "Hello");
    }

    #[test]
    fn snapshot_only_extends() {
        let mut aggregator = ResponseStreamAggregator::new();
        aggregator.ingest(&delta("Hello"));

        let stale = ResponseStreamUpdate::InProgress { snapshot: snapshot("Hel") };
        assert_eq!(aggregator.ingest(&stale), None);

        let ahead = ResponseStreamUpdate::InProgress { snapshot: snapshot("Hello world") };
        assert_eq!(aggregator.ingest(&ahead), Some(" world".into()));
        assert_eq!(aggregator.answer(), "Hello world");

        let diverged = ResponseStreamUpdate::Created { snapshot: snapshot("Goodbye, everyone") };
        assert_eq!(aggregator.ingest(&diverged), None);
    }

    #[test]
    fn completed_and_unknown_add_nothing() {
        let mut aggregator = ResponseStreamAggregator::new();
        aggregator.ingest(&delta("done"));
        assert_eq!(
            aggregator.ingest(&ResponseStreamUpdate::Completed { snapshot: snapshot("done!!") }),
            None
        );
        assert_eq!(
            aggregator.ingest(&ResponseStreamUpdate::Unknown { kind: "response.audio.delta".into() }),
            None
        );
        assert_eq!(aggregator.answer(), "done");
        assert_eq!(aggregator.unrecognized(), 1);
    }

    #[test]
    fn function_call_items_are_counted() {
        let mut aggregator = ResponseStreamAggregator::new();
        aggregator.ingest(&ResponseStreamUpdate::OutputItemAdded {
            item: json!({"type": "function_call", "name": "lookup"}),
        });
        aggregator.ingest(&ResponseStreamUpdate::OutputItemAdded {
            item: json!({"type": "message"}),
        });
        assert_eq!(aggregator.function_calls(), 1);
    }

    #[test]
    fn errors_follow_partial_text() {
        let mut aggregator = ResponseStreamAggregator::new();
        let first = aggregator.append_error(&QueryError::Stream("boom".into()));
        assert_eq!(first, "Error: Stream error: boom");

        let mut partial = ResponseStreamAggregator::new();
        partial.ingest(&delta("Partial"));
        partial.append_error(&QueryError::Stream("boom".into()));
        assert_eq!(partial.answer(), "Partial\n\nError: Stream error: boom");
    }
}
