//! Responses wire format: request encoding and event decoding.

use futures::stream::BoxStream;
use serde::Deserialize;
use tracing::debug;

use super::{decode_sse, ResponseRequest};
use crate::adapter::ResponseInputItem;
use crate::error::{QueryError, Result};
use crate::types::*;

/// Build the JSON request body for `/responses`.
pub fn build_request_body(request: &ResponseRequest, stream: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "input": build_input_items(&request.input),
        "stream": stream,
    });

    let Some(obj) = body.as_object_mut() else {
        return body;
    };

    if let Some(temp) = request.options.temperature {
        obj.insert("temperature".into(), temp.into());
    }
    if let Some(max) = request.options.max_output_tokens {
        obj.insert("max_output_tokens".into(), max.into());
    }
    if !request.options.tools.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .options
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        obj.insert("tools".into(), tools.into());
    }

    body
}

fn build_input_items(items: &[ResponseInputItem]) -> Vec<serde_json::Value> {
    items
        .iter()
        .map(|item| {
            let (role, content_type) = match item.role {
                Role::System => ("system", "input_text"),
                Role::User => ("user", "input_text"),
                Role::Assistant => ("assistant", "output_text"),
            };
            serde_json::json!({
                "role": role,
                "content": [{ "type": content_type, "text": item.text }],
            })
        })
        .collect()
}

/// Decode one `response.*` stream event. Unknown kinds become `Unknown`.
pub fn decode_response_event(data: &str) -> Result<ResponseStreamUpdate> {
    let event: RawEvent = serde_json::from_str(data)?;
    let kind = event.kind.as_str();
    let item_id = || event.item_id.clone().unwrap_or_default();

    let update = match kind {
        "response.created" => ResponseStreamUpdate::Created {
            snapshot: require_snapshot(kind, event.response.clone())?,
        },
        "response.in_progress" => ResponseStreamUpdate::InProgress {
            snapshot: require_snapshot(kind, event.response.clone())?,
        },
        "response.completed" | "response.done" => ResponseStreamUpdate::Completed {
            snapshot: require_snapshot(kind, event.response.clone())?,
        },
        "response.content_part.added" => ResponseStreamUpdate::ContentPartAdded {
            item_id: item_id(),
            text: event
                .part
                .as_ref()
                .and_then(|p| p.text.clone())
                .unwrap_or_default(),
        },
        "response.content_part.done" => ResponseStreamUpdate::ContentPartDone { item_id: item_id() },
        "response.output_text.delta" => ResponseStreamUpdate::OutputTextDelta {
            item_id: item_id(),
            delta: event.delta.clone().unwrap_or_default(),
        },
        "response.output_text.done" => ResponseStreamUpdate::OutputTextDone {
            item_id: item_id(),
            text: event.text.clone().unwrap_or_default(),
        },
        "response.output_item.added" => ResponseStreamUpdate::OutputItemAdded {
            item: event.item.clone().unwrap_or_default(),
        },
        "response.output_item.done" => ResponseStreamUpdate::OutputItemDone {
            item: event.item.clone().unwrap_or_default(),
        },
        "response.failed" | "error" => {
            let message = event
                .error_message()
                .unwrap_or_else(|| format!("{kind} event without details"));
            return Err(QueryError::Stream(message));
        }
        other => {
            debug!(kind = other, "Unmodelled response event");
            ResponseStreamUpdate::Unknown {
                kind: other.to_string(),
            }
        }
    };

    Ok(update)
}

fn require_snapshot(kind: &str, response: Option<ResponseResult>) -> Result<ResponseResult> {
    response.ok_or_else(|| QueryError::Stream(format!("{kind} event is missing its response")))
}

/// Decode a non-streaming Responses body.
pub fn decode_response(body: &str) -> Result<ResponseResult> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(message) = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Err(QueryError::api(200, message));
    }
    Ok(serde_json::from_value(value)?)
}

/// Decode a raw SSE text stream into response updates.
pub fn response_update_stream(
    input: BoxStream<'static, Result<String>>,
) -> BoxStream<'static, Result<ResponseStreamUpdate>> {
    decode_sse(input, decode_response_event)
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    response: Option<ResponseResult>,
    item_id: Option<String>,
    delta: Option<String>,
    text: Option<String>,
    part: Option<RawPart>,
    item: Option<serde_json::Value>,
    message: Option<String>,
    error: Option<RawError>,
}

impl RawEvent {
    fn error_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error.as_ref().and_then(|e| e.message.clone()))
            .or_else(|| {
                self.response
                    .as_ref()
                    .and_then(|r| r.status.clone())
                    .map(|status| format!("response {status}"))
            })
    }
}

#[derive(Deserialize)]
struct RawPart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawError {
    message: Option<String>,
}
