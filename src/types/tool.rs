//! Tool definitions, model tool calls and normalized invocations.

use serde::{Deserialize, Serialize};

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call requested by the model.
///
/// `arguments` is the raw blob exactly as the model produced it, which may
/// not be valid JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// A normalized function invocation ready for plugin dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionInvocation {
    pub id: String,
    pub name: String,
    pub parameters: serde_json::Value,
}

impl FunctionInvocation {
    /// Convert a native tool call, parsing its argument blob.
    ///
    /// Blank arguments become `{}`. Arguments that are not JSON are kept as a
    /// JSON string so the plugin still sees them.
    pub fn from_tool_call(call: &ToolCall) -> Self {
        let parameters = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()))
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            parameters,
        }
    }
}
