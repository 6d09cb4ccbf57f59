//! The query engine: runs one conversational turn end to end.

pub mod events;
pub mod finalize;

pub use events::{QueryEvent, QueryEventPayload, QueryEventSink, QueryStatus};

use std::sync::Arc;

use bon::Builder;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::{prepare_chat_messages, ChatMessage};
use crate::config::EngineConfig;
use crate::context::{ExecutionScope, QueryRegistry, ScopeServices, TranscriptSink};
use crate::error::Result;
use crate::executor::{ExecutionStrategy, Executor};
use crate::models::{ModelSettings, Protocol};
use crate::provider::{ChatProvider, ChatRequest, ResponseProvider};
use crate::tools::{self, PluginExecutor, ToolMode};
use crate::types::{
    CompletionOptions, ConversationMessage, FunctionInvocation, ResultAttachment, Role,
    ToolDefinition, TranscriptMessage,
};

/// One conversational turn to execute.
#[derive(Debug, Clone, Builder)]
pub struct QueryRequest {
    #[builder(into)]
    pub conversation_id: String,
    #[builder(into)]
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    /// Tools to offer. Empty means "whatever the plugin executor advertises".
    #[builder(default)]
    pub tools: Vec<ToolDefinition>,
    #[builder(default)]
    pub plugins_enabled: bool,
    /// Sampling temperature; 1.0 is the service default and is not sent.
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

/// Result of a finished query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query_id: Uuid,
    pub answer: String,
    /// The placeholder assistant message in its final state.
    pub message: TranscriptMessage,
    /// Messages appended after the placeholder (the automated follow-up).
    pub new_messages: Vec<TranscriptMessage>,
    pub invocations: Vec<FunctionInvocation>,
    pub results: Vec<ResultAttachment>,
    pub cancelled: bool,
    pub protocol: Protocol,
    pub strategy: ExecutionStrategy,
    pub max_input_tokens: u32,
}

/// Wires the selector, executors, tool bridge and finalizer together.
#[derive(Builder)]
pub struct QueryEngine {
    #[builder(default)]
    config: EngineConfig,
    chat: Arc<dyn ChatProvider>,
    responses: Arc<dyn ResponseProvider>,
    plugins: Option<Arc<dyn PluginExecutor>>,
    transcript: Arc<dyn TranscriptSink>,
    #[builder(default)]
    registry: Arc<QueryRegistry>,
    events: Option<QueryEventSink>,
}

impl QueryEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry shared with every query; use it to stop a conversation.
    pub fn registry(&self) -> &Arc<QueryRegistry> {
        &self.registry
    }

    /// Cancel every running query in a conversation.
    pub fn stop(&self, conversation_id: &str) -> usize {
        self.registry.cancel_conversation(conversation_id)
    }

    /// Execute one turn.
    ///
    /// Teardown runs on every path. Errors are returned only from the
    /// chat streaming path and from invocation bookkeeping; other transport
    /// failures arrive as in-band answer text.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryOutcome> {
        let settings = self.config.model_or_detected(&request.model);
        let service = self.config.service();
        let protocol = settings.protocol();
        let streaming = service.response_streaming && settings.features.streaming;
        let strategy = ExecutionStrategy::select(protocol, streaming);
        let max_input_tokens = settings.effective_max_input_tokens();
        let mode = ToolMode::resolve(request.plugins_enabled, settings.features.function_calling);
        let chat_request = self.build_request(&request, &settings, mode);

        debug!(
            model = request.model.as_str(),
            ?strategy,
            ?mode,
            max_input_tokens,
            "Executing query"
        );

        let mut scope = ExecutionScope::open(
            self.scope_services(),
            request.conversation_id.clone(),
            &request.model,
            protocol,
            service.response_timeout(),
        );
        let executor = strategy.executor(self.chat.clone(), self.responses.clone());

        match self
            .run(&request, executor.as_ref(), &chat_request, mode, &mut scope)
            .await
        {
            Ok(run) => {
                scope.retire(if run.cancelled {
                    QueryStatus::Cancelled
                } else {
                    QueryStatus::Completed
                });
                Ok(QueryOutcome {
                    query_id: scope.query_id(),
                    answer: run.answer,
                    message: scope.placeholder().clone(),
                    new_messages: scope.appended().to_vec(),
                    invocations: run.invocations,
                    results: run.results,
                    cancelled: run.cancelled,
                    protocol,
                    strategy,
                    max_input_tokens,
                })
            }
            Err(e) => {
                warn!(model = request.model.as_str(), error = %e, "Query failed");
                scope.retire(QueryStatus::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: &QueryRequest,
        executor: &dyn Executor,
        chat_request: &ChatRequest,
        mode: ToolMode,
        scope: &mut ExecutionScope,
    ) -> Result<RunResult> {
        let output = executor.execute(chat_request, scope).await?;
        let normalized = tools::normalize(mode, output.answer, &output.tool_calls);

        let plugins = if request.plugins_enabled {
            self.plugins.as_deref()
        } else {
            None
        };
        let results = tools::process_functions(scope, &normalized.invocations, plugins).await?;

        let cancelled = scope.is_cancelled();
        finalize::complete(scope, &normalized.answer, results.clone(), cancelled);

        Ok(RunResult {
            answer: normalized.answer,
            invocations: normalized.invocations,
            results,
            cancelled,
        })
    }

    fn scope_services(&self) -> ScopeServices {
        ScopeServices {
            registry: self.registry.clone(),
            transcript: self.transcript.clone(),
            events: self.events.clone(),
        }
    }

    fn tool_definitions(&self, request: &QueryRequest, mode: ToolMode) -> Vec<ToolDefinition> {
        if mode == ToolMode::Disabled {
            return Vec::new();
        }
        if !request.tools.is_empty() {
            return request.tools.clone();
        }
        self.plugins
            .as_ref()
            .map(|p| p.definitions())
            .unwrap_or_default()
    }

    /// Prepared chat request: adapted messages, model instructions, tools
    /// and generation options.
    fn build_request(
        &self,
        request: &QueryRequest,
        settings: &ModelSettings,
        mode: ToolMode,
    ) -> ChatRequest {
        let instruction_role = if settings.features.system_messages {
            Role::System
        } else {
            Role::User
        };

        let mut messages = Vec::new();
        if let Some(instructions) = settings.instructions.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::text(instruction_role, instructions));
        }
        messages.extend(prepare_chat_messages(&request.messages));

        let tools = self.tool_definitions(request, mode);
        let native_tools = match mode {
            ToolMode::Native => tools,
            ToolMode::TextConvention => {
                if !tools.is_empty() {
                    messages.push(ChatMessage::text(
                        instruction_role,
                        tools::tool_instructions(&tools),
                    ));
                }
                Vec::new()
            }
            ToolMode::Disabled => Vec::new(),
        };

        ChatRequest {
            model: request.model.clone(),
            messages,
            options: CompletionOptions::builder()
                .maybe_temperature(
                    request
                        .temperature
                        .filter(|t| (*t - 1.0).abs() > f64::EPSILON),
                )
                .maybe_max_output_tokens(request.max_output_tokens)
                .tools(native_tools)
                .build(),
        }
    }
}

struct RunResult {
    answer: String,
    invocations: Vec<FunctionInvocation>,
    results: Vec<ResultAttachment>,
    cancelled: bool,
}
