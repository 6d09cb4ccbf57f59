//! Chat Completions wire format: request encoding and reply decoding.

use futures::stream::BoxStream;
use serde::Deserialize;

use super::{decode_sse, ChatRequest};
use crate::adapter::{ChatContentPart, ChatMessage};
use crate::error::{QueryError, Result};
use crate::types::*;

/// Build the JSON request body for `/chat/completions`.
pub fn build_request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
    let messages = request
        .messages
        .iter()
        .map(message_to_openai)
        .collect::<Vec<_>>();

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "stream": stream,
    });

    let Some(obj) = body.as_object_mut() else {
        return body;
    };

    if let Some(temp) = request.options.temperature {
        obj.insert("temperature".into(), temp.into());
    }
    if let Some(max) = request.options.max_output_tokens {
        obj.insert("max_completion_tokens".into(), max.into());
    }

    if !request.options.tools.is_empty() {
        let tool_defs: Vec<serde_json::Value> = request
            .options
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        obj.insert("tools".into(), tool_defs.into());
    }

    body
}

fn message_to_openai(msg: &ChatMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    // Simple single-text message
    if let [ChatContentPart::Text(text)] = msg.parts.as_slice() {
        return serde_json::json!({ "role": role, "content": text });
    }

    let parts: Vec<serde_json::Value> = msg
        .parts
        .iter()
        .map(|part| match part {
            ChatContentPart::Text(text) => serde_json::json!({
                "type": "text",
                "text": text,
            }),
            ChatContentPart::Image { source, detail } => serde_json::json!({
                "type": "image_url",
                "image_url": { "url": source.to_url(), "detail": detail },
            }),
        })
        .collect();

    serde_json::json!({ "role": role, "content": parts })
}

/// Decode one `chat.completion.chunk` payload.
pub fn decode_chat_chunk(data: &str) -> Result<ChatStreamChunk> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(ChatStreamChunk::default());
    };

    let content = choice.delta.content.into_iter().collect();
    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallFragment {
                index: tc.index,
                id: tc.id,
                name,
                arguments,
            }
        })
        .collect();

    Ok(ChatStreamChunk {
        content,
        tool_calls,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
    })
}

/// Decode a non-streaming chat completion body.
pub fn decode_chat_completion(body: &str) -> Result<ChatCompletion> {
    let data: OpenAiChatResponse = serde_json::from_str(body)?;
    if let Some(error) = data.error {
        return Err(QueryError::api(200, error.message));
    }
    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| QueryError::api(200, "No choices in chat completion"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    Ok(ChatCompletion {
        content: choice.message.content.into_iter().collect(),
        tool_calls,
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::parse),
    })
}

/// Decode a raw SSE text stream into chat chunks.
pub fn chat_chunk_stream(
    input: BoxStream<'static, Result<String>>,
) -> BoxStream<'static, Result<ChatStreamChunk>> {
    decode_sse(input, decode_chat_chunk)
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    error: Option<OpenAiError>,
}

#[derive(Deserialize)]
struct OpenAiError {
    message: String,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
