//! Non-streaming results and request options.

use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::EnumString;

use super::tool::{ToolCall, ToolDefinition};

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FinishReason {
    #[strum(serialize = "stop")]
    Stop,
    #[strum(serialize = "length")]
    Length,
    #[strum(serialize = "tool_calls", serialize = "function_call")]
    ToolCalls,
    #[strum(serialize = "content_filter")]
    ContentFilter,
    /// A reason this crate does not recognize, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Other(s) => s,
        }
    }

    /// Lenient parse; unknown values land in `Other`.
    pub fn parse(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|_| Self::Other(s.to_string()))
    }
}

impl Serialize for FinishReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A complete chat-protocol reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// A response-protocol result, either final or a streaming snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ResponseOutputItem>,
}

impl ResponseResult {
    /// Concatenated `output_text` content of every message item.
    pub fn output_text(&self) -> String {
        let mut text = String::new();
        for item in &self.output {
            if let ResponseOutputItem::Message { content, .. } = item {
                for part in content {
                    if let ResponseOutputContent::OutputText { text: t } = part {
                        text.push_str(t);
                    }
                }
            }
        }
        text
    }

    /// Number of function-call items in the output.
    pub fn function_call_count(&self) -> usize {
        self.output
            .iter()
            .filter(|item| matches!(item, ResponseOutputItem::FunctionCall { .. }))
            .count()
    }
}

/// An item in a response-protocol output list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseOutputItem {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        content: Vec<ResponseOutputContent>,
    },
    FunctionCall {
        #[serde(default)]
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    Reasoning {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Content inside a response-protocol message item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseOutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

/// Per-request generation options.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// Native tool definitions; empty when tools travel in the message text.
    #[builder(default)]
    pub tools: Vec<ToolDefinition>,
}
