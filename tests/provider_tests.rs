//! Wire codecs driven end to end through the engine.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;

use aiquery::context::MemoryTranscript;
use aiquery::engine::{QueryEngine, QueryRequest};
use aiquery::error::{QueryError, Result};
use aiquery::provider::{
    openai, openai_responses, ChatProvider, ChatRequest, ResponseProvider, ResponseRequest,
};
use aiquery::tools::{FnPlugin, PluginOutput, PluginRegistry};
use aiquery::types::*;

/// Transport stand-in that replays raw SSE bodies in small pieces.
struct SseReplay {
    chat_body: String,
    response_body: String,
}

fn pieces(body: &str) -> BoxStream<'static, Result<String>> {
    let chunks: Vec<Result<String>> = body
        .as_bytes()
        .chunks(7)
        .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
        .collect();
    stream::iter(chunks).boxed()
}

#[async_trait]
impl ChatProvider for SseReplay {
    async fn complete_chat(&self, _request: &ChatRequest) -> Result<ChatCompletion> {
        Err(QueryError::Transport("streaming only".into()))
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<ChatStreamChunk>>> {
        let body = openai::build_request_body(request, true);
        assert_eq!(body["stream"], json!(true));
        Ok(openai::chat_chunk_stream(pieces(&self.chat_body)))
    }
}

#[async_trait]
impl ResponseProvider for SseReplay {
    async fn create_response(&self, _request: &ResponseRequest) -> Result<ResponseResult> {
        Err(QueryError::Transport("streaming only".into()))
    }

    async fn stream_response(
        &self,
        request: &ResponseRequest,
    ) -> Result<BoxStream<'static, Result<ResponseStreamUpdate>>> {
        let body = openai_responses::build_request_body(request, true);
        assert_eq!(body["model"], json!(request.model));
        Ok(openai_responses::response_update_stream(pieces(
            &self.response_body,
        )))
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    let mut body = String::from(": keep-alive\n\n");
    for event in events {
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn engine(replay: SseReplay, transcript: Arc<MemoryTranscript>) -> QueryEngine {
    let replay = Arc::new(replay);
    let plugins = PluginRegistry::new().with(FnPlugin::new(
        ToolDefinition::new("weather", "Current weather", json!({"type": "object"})),
        |params, _| async move {
            Ok(PluginOutput::text(format!(
                "sunny in {}",
                params["city"].as_str().unwrap_or("?")
            )))
        },
    ));
    QueryEngine::builder()
        .chat(replay.clone())
        .responses(replay)
        .plugins(Arc::new(plugins))
        .transcript(transcript)
        .build()
}

#[tokio::test]
async fn chat_sse_with_tool_call() {
    let chat_body = sse(&[
        json!({"choices": [{"index": 0, "delta": {"content": "Let me "}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "check."}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_w", "function": {"name": "weather", "arguments": "{\"ci"}}
        ]}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "ty\":\"Oslo\"}"}}
        ]}, "finish_reason": null}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
    ]);
    let transcript = Arc::new(MemoryTranscript::new());
    let engine = engine(
        SseReplay {
            chat_body,
            response_body: String::new(),
        },
        transcript.clone(),
    );

    let outcome = engine
        .query(
            QueryRequest::builder()
                .conversation_id("c")
                .model("gpt-4o")
                .messages(vec![ConversationMessage::user("weather in Oslo?")])
                .plugins_enabled(true)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Let me check.");
    assert_eq!(outcome.invocations[0].parameters, json!({"city": "Oslo"}));
    assert_eq!(outcome.results[0].payload, "sunny in Oslo");
    assert_eq!(transcript.messages("c").len(), 2);
}

#[tokio::test]
async fn response_sse_text() {
    let response_body = sse(&[
        json!({"type": "response.created", "response": {"id": "r1", "status": "in_progress", "output": []}}),
        json!({"type": "response.output_item.added", "item": {"type": "message", "id": "m1"}}),
        json!({"type": "response.output_text.delta", "item_id": "m1", "delta": "Hi "}),
        json!({"type": "response.output_text.delta", "item_id": "m1", "delta": "there"}),
        json!({"type": "response.output_text.done", "item_id": "m1", "text": "Hi there"}),
        json!({"type": "response.completed", "response": {"id": "r1", "status": "completed", "output": [
            {"type": "message", "id": "m1", "content": [{"type": "output_text", "text": "Hi there"}]}
        ]}}),
    ]);
    let transcript = Arc::new(MemoryTranscript::new());
    let engine = engine(
        SseReplay {
            chat_body: String::new(),
            response_body,
        },
        transcript.clone(),
    );

    let outcome = engine
        .query(
            QueryRequest::builder()
                .conversation_id("c")
                .model("o3-pro")
                .messages(vec![ConversationMessage::user("hello")])
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Hi there");
    assert_eq!(transcript.messages("c")[0].body, "Hi there");
}

#[tokio::test]
async fn response_sse_failure_event_becomes_text() {
    let response_body = sse(&[
        json!({"type": "response.output_text.delta", "item_id": "m1", "delta": "Par"}),
        json!({"type": "response.failed", "response": {"id": "r1", "status": "failed", "output": [],
            "error": {"message": "quota exceeded"}}}),
    ]);
    let transcript = Arc::new(MemoryTranscript::new());
    let engine = engine(
        SseReplay {
            chat_body: String::new(),
            response_body,
        },
        transcript,
    );

    let outcome = engine
        .query(
            QueryRequest::builder()
                .conversation_id("c")
                .model("o3-pro")
                .messages(vec![ConversationMessage::user("hello")])
                .build(),
        )
        .await
        .unwrap();

    assert!(outcome.answer.starts_with("Par\n\nError: Stream error: "));
}
