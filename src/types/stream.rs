//! Streaming update types for both wire protocols.

use serde::{Deserialize, Serialize};

use super::completion::{FinishReason, ResponseResult};

/// One fragment of a tool call delivered by the chat protocol.
///
/// Fragments for the same call share an `index`. The id and name usually
/// arrive once; the argument blob arrives in pieces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One chat-protocol streaming update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatStreamChunk {
    /// Chunk carrying a single text delta.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            content: vec![delta.into()],
            ..Default::default()
        }
    }

    /// Chunk carrying a single tool-call fragment.
    pub fn tool_fragment(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }
}

/// One response-protocol streaming update.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseStreamUpdate {
    Created { snapshot: ResponseResult },
    InProgress { snapshot: ResponseResult },
    Completed { snapshot: ResponseResult },
    ContentPartAdded { item_id: String, text: String },
    ContentPartDone { item_id: String },
    OutputTextDelta { item_id: String, delta: String },
    OutputTextDone { item_id: String, text: String },
    OutputItemAdded { item: serde_json::Value },
    OutputItemDone { item: serde_json::Value },
    /// Any update kind this crate does not model.
    Unknown { kind: String },
}

/// How an update contributes to the answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextContribution {
    /// Full aggregated text so far.
    Snapshot(String),
    /// Incremental text to append.
    Fragment(String),
}

/// Non-text meaning of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralSignal {
    ResponseCompleted,
    PartDone,
    TextDone,
    ItemAdded { kind: String },
    ItemDone { kind: String },
    /// Textual fallback for an unrecognized update. Logged, never appended.
    Unrecognized(String),
}

/// The result of classifying one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub text: Option<TextContribution>,
    pub signal: Option<StructuralSignal>,
}

impl ResponseStreamUpdate {
    /// Map every update kind to its text contribution and structural meaning.
    pub fn classify(&self) -> Classified {
        match self {
            Self::Created { snapshot } | Self::InProgress { snapshot } => Classified {
                text: Some(TextContribution::Snapshot(snapshot.output_text())),
                signal: None,
            },
            Self::ContentPartAdded { text, .. } => Classified {
                text: Some(TextContribution::Fragment(text.clone())),
                signal: None,
            },
            Self::OutputTextDelta { delta, .. } => Classified {
                text: Some(TextContribution::Fragment(delta.clone())),
                signal: None,
            },
            Self::Completed { .. } => Classified {
                text: None,
                signal: Some(StructuralSignal::ResponseCompleted),
            },
            Self::ContentPartDone { .. } => Classified {
                text: None,
                signal: Some(StructuralSignal::PartDone),
            },
            Self::OutputTextDone { .. } => Classified {
                text: None,
                signal: Some(StructuralSignal::TextDone),
            },
            Self::OutputItemAdded { item } => Classified {
                text: None,
                signal: Some(StructuralSignal::ItemAdded {
                    kind: item_kind(item),
                }),
            },
            Self::OutputItemDone { item } => Classified {
                text: None,
                signal: Some(StructuralSignal::ItemDone {
                    kind: item_kind(item),
                }),
            },
            Self::Unknown { kind } => Classified {
                text: None,
                signal: Some(StructuralSignal::Unrecognized(format!(
                    "unrecognized response update '{kind}'"
                ))),
            },
        }
    }
}

fn item_kind(item: &serde_json::Value) -> String {
    item.get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown")
        .to_string()
}
