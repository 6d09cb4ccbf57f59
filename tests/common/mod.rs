//! Shared test helpers and mock providers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use aiquery::context::MemoryTranscript;
use aiquery::engine::{QueryEngine, QueryEvent};
use aiquery::error::{QueryError, Result};
use aiquery::provider::{ChatProvider, ChatRequest, ResponseProvider, ResponseRequest};
use aiquery::tools::{PluginExecutor, PluginOutput};
use aiquery::types::*;

/// A scripted chat stream.
pub struct ChatScript {
    items: Vec<Result<ChatStreamChunk>>,
    /// Keep the stream open after the scripted items.
    hang: bool,
}

impl ChatScript {
    pub fn new(items: Vec<Result<ChatStreamChunk>>) -> Self {
        Self { items, hang: false }
    }

    pub fn hanging(items: Vec<Result<ChatStreamChunk>>) -> Self {
        Self { items, hang: true }
    }
}

/// A mock chat provider that returns canned replies in order.
#[derive(Default)]
pub struct MockChatProvider {
    completions: Mutex<VecDeque<Result<ChatCompletion>>>,
    streams: Mutex<VecDeque<Result<ChatScript>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_completion(&self, completion: Result<ChatCompletion>) {
        self.completions.lock().unwrap().push_back(completion);
    }

    pub fn queue_stream(&self, script: Result<ChatScript>) {
        self.streams.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete_chat(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().unwrap().push(request.clone());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Transport("no completion queued".into())))
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<ChatStreamChunk>>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Transport("no stream queued".into())))?;
        let items = stream::iter(script.items);
        if script.hang {
            Ok(items.chain(stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }
}

/// A mock response-protocol provider.
#[derive(Default)]
pub struct MockResponseProvider {
    results: Mutex<VecDeque<Result<ResponseResult>>>,
    streams: Mutex<VecDeque<Result<Vec<Result<ResponseStreamUpdate>>>>>,
    requests: Mutex<Vec<ResponseRequest>>,
}

impl MockResponseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_result(&self, result: Result<ResponseResult>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn queue_stream(&self, updates: Result<Vec<Result<ResponseStreamUpdate>>>) {
        self.streams.lock().unwrap().push_back(updates);
    }

    pub fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseProvider for MockResponseProvider {
    async fn create_response(&self, request: &ResponseRequest) -> Result<ResponseResult> {
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Transport("no response queued".into())))
    }

    async fn stream_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<BoxStream<'static, Result<ResponseStreamUpdate>>> {
        self.requests.lock().unwrap().push(request.clone());
        let updates = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Transport("no stream queued".into())))?;
        Ok(stream::iter(updates).boxed())
    }
}

/// Plugin executor that records invocations and answers from a closure.
pub struct RecordingPlugins {
    definitions: Vec<ToolDefinition>,
    calls: Mutex<Vec<FunctionInvocation>>,
    respond: Box<dyn Fn(&FunctionInvocation) -> Result<PluginOutput> + Send + Sync>,
}

impl RecordingPlugins {
    pub fn new(
        definitions: Vec<ToolDefinition>,
        respond: impl Fn(&FunctionInvocation) -> Result<PluginOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            definitions,
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn calls(&self) -> Vec<FunctionInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PluginExecutor for RecordingPlugins {
    async fn invoke(
        &self,
        invocation: &FunctionInvocation,
        _cancel: &CancellationToken,
    ) -> Result<PluginOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        (self.respond)(invocation)
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

/// Everything a test needs to drive and inspect an engine.
pub struct Harness {
    pub chat: Arc<MockChatProvider>,
    pub responses: Arc<MockResponseProvider>,
    pub transcript: Arc<MemoryTranscript>,
    pub events: Arc<Mutex<Vec<QueryEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            chat: Arc::new(MockChatProvider::new()),
            responses: Arc::new(MockResponseProvider::new()),
            transcript: Arc::new(MemoryTranscript::new()),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn engine(
        &self,
        config: aiquery::config::EngineConfig,
        plugins: Option<Arc<dyn PluginExecutor>>,
    ) -> QueryEngine {
        let events = self.events.clone();
        QueryEngine::builder()
            .config(config)
            .chat(self.chat.clone())
            .responses(self.responses.clone())
            .maybe_plugins(plugins)
            .transcript(self.transcript.clone())
            .events(Arc::new(move |event: QueryEvent| {
                events.lock().unwrap().push(event)
            }))
            .build()
    }

    pub fn events(&self) -> Vec<QueryEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// A tool-call fragment chunk; empty strings leave the field unset.
pub fn fragment(index: usize, id: &str, name: &str, arguments: &str) -> ChatStreamChunk {
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    ChatStreamChunk::tool_fragment(ToolCallFragment {
        index,
        id: opt(id),
        name: opt(name),
        arguments: opt(arguments),
    })
}

pub fn finish(reason: FinishReason) -> ChatStreamChunk {
    ChatStreamChunk {
        finish_reason: Some(reason),
        ..Default::default()
    }
}

pub fn response_with_text(text: &str) -> ResponseResult {
    ResponseResult {
        id: "resp_1".into(),
        status: Some("completed".into()),
        output: vec![ResponseOutputItem::Message {
            id: Some("msg_1".into()),
            content: vec![ResponseOutputContent::OutputText { text: text.into() }],
        }],
    }
}

/// Poll until `check` holds or a second passes.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
