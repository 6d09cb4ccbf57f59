//! Protocol executors and strategy selection.

pub mod buffered;
pub mod chat_stream;
pub mod response_stream;

pub use buffered::{ChatBufferedExecutor, ResponseBufferedExecutor};
pub use chat_stream::{ChatStreamAggregator, ChatStreamExecutor};
pub use response_stream::{ResponseStreamAggregator, ResponseStreamExecutor};

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapter::downgrade_to_response_items;
use crate::context::ExecutionScope;
use crate::error::{QueryError, Result};
use crate::models::Protocol;
use crate::provider::{ChatProvider, ChatRequest, ResponseProvider, ResponseRequest};
use crate::types::ToolCall;

/// What one protocol round trip produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    pub answer: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Runs a prepared request against one protocol variant.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        request: &ChatRequest,
        scope: &mut ExecutionScope,
    ) -> Result<ExecutionOutput>;
}

/// The four ways a query can run, chosen once per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    ChatStreaming,
    ChatBuffered,
    ResponseStreaming,
    ResponseBuffered,
}

impl ExecutionStrategy {
    pub fn select(protocol: Protocol, streaming: bool) -> Self {
        match (protocol, streaming) {
            (Protocol::Chat, true) => Self::ChatStreaming,
            (Protocol::Chat, false) => Self::ChatBuffered,
            (Protocol::Response, true) => Self::ResponseStreaming,
            (Protocol::Response, false) => Self::ResponseBuffered,
        }
    }

    pub fn protocol(self) -> Protocol {
        match self {
            Self::ChatStreaming | Self::ChatBuffered => Protocol::Chat,
            Self::ResponseStreaming | Self::ResponseBuffered => Protocol::Response,
        }
    }

    pub fn is_streaming(self) -> bool {
        matches!(self, Self::ChatStreaming | Self::ResponseStreaming)
    }

    pub fn executor(
        self,
        chat: Arc<dyn ChatProvider>,
        responses: Arc<dyn ResponseProvider>,
    ) -> Box<dyn Executor> {
        match self {
            Self::ChatStreaming => Box::new(ChatStreamExecutor::new(chat)),
            Self::ChatBuffered => Box::new(ChatBufferedExecutor::new(chat)),
            Self::ResponseStreaming => Box::new(ResponseStreamExecutor::new(responses)),
            Self::ResponseBuffered => Box::new(ResponseBufferedExecutor::new(responses)),
        }
    }
}

/// Response-protocol request for a prepared chat request.
pub fn response_request(request: &ChatRequest) -> ResponseRequest {
    ResponseRequest {
        model: request.model.clone(),
        input: downgrade_to_response_items(&request.messages),
        options: request.options.clone(),
    }
}

/// Visible in-band text for a failure.
pub fn error_text(error: &QueryError) -> String {
    format!("Error: {error}")
}
