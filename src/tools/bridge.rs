//! Normalizes model tool calls and runs one function-calling round.

use tracing::{debug, warn};

use super::plugin::{PluginExecutor, PluginOutput, JSON_CONTENT_TYPE};
use super::text_convention;
use crate::context::ExecutionScope;
use crate::engine::events::QueryEventPayload;
use crate::error::Result;
use crate::executor::error_text;
use crate::types::{AttachmentVisibility, FunctionInvocation, ResultAttachment, ToolCall};

/// Title of the attachment recording what the model asked for.
pub const INVOCATION_RECORD_TITLE: &str = "Function Calls";

/// Title of the attachment carrying one invocation's result.
pub fn result_title(invocation_id: &str) -> String {
    format!("Function Results (Id:{invocation_id})")
}

/// How tools reach the model for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// No tools are offered.
    Disabled,
    /// Tool definitions travel in the request options.
    Native,
    /// Tool definitions and calls travel in message text.
    TextConvention,
}

impl ToolMode {
    pub fn resolve(plugins_enabled: bool, function_calling: bool) -> Self {
        match (plugins_enabled, function_calling) {
            (false, _) => Self::Disabled,
            (true, true) => Self::Native,
            (true, false) => Self::TextConvention,
        }
    }
}

/// Visible answer plus the invocations it requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedAnswer {
    pub answer: String,
    pub invocations: Vec<FunctionInvocation>,
}

/// Turn native tool calls or in-text blocks into invocations.
pub fn normalize(mode: ToolMode, answer: String, tool_calls: &[ToolCall]) -> NormalizedAnswer {
    match mode {
        ToolMode::Native => NormalizedAnswer {
            answer,
            invocations: tool_calls.iter().map(FunctionInvocation::from_tool_call).collect(),
        },
        ToolMode::TextConvention => {
            let (answer, invocations) = text_convention::extract(&answer);
            NormalizedAnswer {
                answer,
                invocations,
            }
        }
        ToolMode::Disabled => {
            if !tool_calls.is_empty() {
                debug!(count = tool_calls.len(), "Ignoring tool calls with tools disabled");
            }
            NormalizedAnswer {
                answer,
                invocations: Vec::new(),
            }
        }
    }
}

/// Attachment listing the invocations as `[{id, name, parameters}]`.
///
/// Shown to the user only; it is never replayed to the model.
pub fn invocation_record(invocations: &[FunctionInvocation]) -> Result<ResultAttachment> {
    Ok(ResultAttachment {
        title: INVOCATION_RECORD_TITLE.to_string(),
        content_type: JSON_CONTENT_TYPE.to_string(),
        payload: serde_json::to_string_pretty(invocations)?,
        visibility: AttachmentVisibility::UserOnly,
    })
}

/// Parse an invocation record back into invocations.
pub fn parse_invocation_record(record: &ResultAttachment) -> Result<Vec<FunctionInvocation>> {
    Ok(serde_json::from_str(&record.payload)?)
}

/// Record the invocations on the placeholder and dispatch them in order.
///
/// `plugins` is `None` when plugins are disabled; the record is still
/// attached. A failing invocation yields its error text as the result and
/// does not stop the others. Nothing more is dispatched once the query is
/// cancelled.
pub async fn process_functions(
    scope: &mut ExecutionScope,
    invocations: &[FunctionInvocation],
    plugins: Option<&dyn PluginExecutor>,
) -> Result<Vec<ResultAttachment>> {
    if invocations.is_empty() {
        return Ok(Vec::new());
    }

    scope.attach(invocation_record(invocations)?);
    scope.mark_automated();
    scope.touch();

    let Some(plugins) = plugins else {
        return Ok(Vec::new());
    };

    let cancellation = scope.cancellation().clone();
    let mut results = Vec::with_capacity(invocations.len());
    for invocation in invocations {
        if cancellation.is_cancelled() {
            debug!(
                remaining = invocations.len() - results.len(),
                "Query cancelled, skipping remaining functions"
            );
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            outcome = plugins.invoke(invocation, cancellation.token()) => outcome,
        };

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = invocation.name.as_str(), error = %e, "Function invocation failed");
                PluginOutput::text(error_text(&e))
            }
        };

        results.push(ResultAttachment {
            title: result_title(&invocation.id),
            content_type: output.content_type,
            payload: output.payload,
            visibility: AttachmentVisibility::SentToModel,
        });
    }

    scope.emit(QueryEventPayload::FunctionsDispatched {
        count: results.len(),
    });
    Ok(results)
}
