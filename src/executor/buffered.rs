//! Non-streaming executors for both protocols.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{error_text, response_request, ExecutionOutput, Executor};
use crate::context::ExecutionScope;
use crate::error::Result;
use crate::provider::{ChatProvider, ChatRequest, ResponseProvider};
use crate::types::{ChatCompletion, FinishReason};

/// Answer for a reply cut short by the output-token limit.
pub const TRUNCATION_NOTICE: &str =
    "Incomplete model output due to MaxTokens parameter or token limit exceeded.";

/// Answer for a reply withheld by a content filter.
pub const FILTERED_NOTICE: &str = "Omitted content due to a content filter flag.";

/// Separator between content fragments of a complete reply.
const FRAGMENT_SEPARATOR: &str = "\r\n";

/// Pick the answer text for a chat completion based on its finish reason.
pub fn chat_answer(completion: &ChatCompletion) -> String {
    match &completion.finish_reason {
        None | Some(FinishReason::Stop) | Some(FinishReason::ToolCalls) => {
            completion.content.join(FRAGMENT_SEPARATOR)
        }
        Some(FinishReason::Length) => TRUNCATION_NOTICE.to_string(),
        Some(FinishReason::ContentFilter) => FILTERED_NOTICE.to_string(),
        Some(FinishReason::Other(reason)) => {
            debug!(reason = reason.as_str(), "Unrecognized finish reason");
            serde_json::to_string(completion).unwrap_or_else(|_| format!("{completion:?}"))
        }
    }
}

/// Single chat round trip. Failures become in-band error text.
pub struct ChatBufferedExecutor {
    provider: Arc<dyn ChatProvider>,
}

impl ChatBufferedExecutor {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Executor for ChatBufferedExecutor {
    async fn execute(
        &self,
        request: &ChatRequest,
        scope: &mut ExecutionScope,
    ) -> Result<ExecutionOutput> {
        let cancellation = scope.cancellation().clone();
        debug!(model = request.model.as_str(), "Chat completion");

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Ok(ExecutionOutput::default()),
            result = self.provider.complete_chat(request) => result,
        };

        match result {
            Ok(completion) => Ok(ExecutionOutput {
                answer: chat_answer(&completion),
                tool_calls: completion.tool_calls,
            }),
            Err(e) => {
                warn!(model = request.model.as_str(), error = %e, "Chat completion failed");
                Ok(ExecutionOutput {
                    answer: error_text(&e),
                    tool_calls: Vec::new(),
                })
            }
        }
    }
}

/// Single response round trip. Failures become in-band error text.
pub struct ResponseBufferedExecutor {
    provider: Arc<dyn ResponseProvider>,
}

impl ResponseBufferedExecutor {
    pub fn new(provider: Arc<dyn ResponseProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Executor for ResponseBufferedExecutor {
    async fn execute(
        &self,
        request: &ChatRequest,
        scope: &mut ExecutionScope,
    ) -> Result<ExecutionOutput> {
        let cancellation = scope.cancellation().clone();
        let request = response_request(request);
        debug!(model = request.model.as_str(), "Response create");

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Ok(ExecutionOutput::default()),
            result = self.provider.create_response(&request) => result,
        };

        let answer = match result {
            Ok(response) => {
                let calls = response.function_call_count();
                if calls > 0 {
                    warn!(count = calls, "Response requested function calls; they are not dispatched");
                }
                response.output_text()
            }
            Err(e) => {
                warn!(model = request.model.as_str(), error = %e, "Response create failed");
                error_text(&e)
            }
        };

        Ok(ExecutionOutput {
            answer,
            tool_calls: Vec::new(),
        })
    }
}
