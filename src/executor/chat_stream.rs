//! Chat-protocol streaming: text accumulation and tool-call reassembly.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::{ExecutionOutput, Executor};
use crate::context::ExecutionScope;
use crate::error::{QueryError, Result};
use crate::provider::{ChatProvider, ChatRequest};
use crate::types::{ChatStreamChunk, ToolCall, ToolCallFragment};

/// Lifecycle of a [`ChatStreamAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// Accepting chunks.
    Open,
    /// Stream ended or was cancelled; no more chunks.
    Drained,
    /// Tool calls have been emitted.
    Finalized,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates answer text and per-index tool-call fragments.
#[derive(Debug)]
pub struct ChatStreamAggregator {
    state: AggregatorState,
    answer: String,
    calls: BTreeMap<usize, PendingCall>,
}

impl Default for ChatStreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStreamAggregator {
    pub fn new() -> Self {
        Self {
            state: AggregatorState::Open,
            answer: String::new(),
            calls: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Fold one chunk in. Returns the text it added, in receipt order.
    pub fn ingest(&mut self, chunk: ChatStreamChunk) -> Result<String> {
        if self.state != AggregatorState::Open {
            return Err(QueryError::InvalidState(format!(
                "cannot ingest chunk in {:?} state",
                self.state
            )));
        }

        let mut added = String::new();
        for text in chunk.content {
            added.push_str(&text);
        }
        self.answer.push_str(&added);

        for fragment in chunk.tool_calls {
            self.merge_fragment(fragment);
        }

        Ok(added)
    }

    fn merge_fragment(&mut self, fragment: ToolCallFragment) {
        let call = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|s| !s.is_empty()) {
            call.id = Some(id);
        }
        if let Some(name) = fragment.name.filter(|s| !s.is_empty()) {
            call.name = Some(name);
        }
        if let Some(arguments) = fragment.arguments {
            call.arguments.push_str(&arguments);
        }
    }

    /// Stop accepting chunks.
    pub fn drain(&mut self) -> Result<()> {
        match self.state {
            AggregatorState::Open => {
                self.state = AggregatorState::Drained;
                Ok(())
            }
            other => Err(QueryError::InvalidState(format!("cannot drain in {other:?} state"))),
        }
    }

    /// Emit one tool call per index that has both an id and a name.
    pub fn finalize(&mut self) -> Result<(String, Vec<ToolCall>)> {
        if self.state != AggregatorState::Drained {
            return Err(QueryError::InvalidState(format!(
                "cannot finalize in {:?} state",
                self.state
            )));
        }
        self.state = AggregatorState::Finalized;

        let mut tool_calls = Vec::new();
        for (index, call) in std::mem::take(&mut self.calls) {
            match (call.id, call.name) {
                (Some(id), Some(name)) => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: call.arguments,
                }),
                (id, name) => {
                    debug!(index, ?id, ?name, "Dropping incomplete tool call");
                }
            }
        }

        Ok((std::mem::take(&mut self.answer), tool_calls))
    }
}

/// Streams a chat request and forwards text to the transcript as it arrives.
///
/// Transport errors are returned to the caller. Cancellation stops reading,
/// keeps the text received so far and discards partial tool calls.
pub struct ChatStreamExecutor {
    provider: Arc<dyn ChatProvider>,
}

impl ChatStreamExecutor {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Executor for ChatStreamExecutor {
    async fn execute(
        &self,
        request: &ChatRequest,
        scope: &mut ExecutionScope,
    ) -> Result<ExecutionOutput> {
        let cancellation = scope.cancellation().clone();
        debug!(model = request.model.as_str(), "Chat stream");

        let mut stream = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Ok(ExecutionOutput::default()),
            opened = self.provider.stream_chat(request) => opened?,
        };

        let mut aggregator = ChatStreamAggregator::new();
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!(query_id = %scope.query_id(), "Chat stream cancelled");
                    cancelled = true;
                    break;
                }
                next = stream.next() => {
                    let Some(chunk) = next else { break; };
                    let added = aggregator.ingest(chunk?)?;
                    scope.append_text(&added);
                }
            }
        }

        aggregator.drain()?;
        let (answer, tool_calls) = aggregator.finalize()?;
        Ok(ExecutionOutput {
            answer,
            tool_calls: if cancelled { Vec::new() } else { tool_calls },
        })
    }
}
