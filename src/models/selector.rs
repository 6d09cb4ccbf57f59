//! Endpoint selection between the chat and response protocols.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;
use tracing::warn;

/// Model-name fragments that require the response protocol.
pub const RESPONSE_MODEL_PATTERNS: &[&str] = &["o3-pro"];

/// Configured endpoint type for a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum EndpointType {
    /// Decide from the model name.
    #[default]
    #[strum(serialize = "auto", serialize = "")]
    Auto,
    #[strum(serialize = "chat_completion", serialize = "chat", serialize = "chatcompletion")]
    ChatCompletion,
    #[strum(serialize = "response_api", serialize = "responses", serialize = "response")]
    ResponseApi,
    /// Unrecognized configuration value, kept verbatim.
    #[strum(default)]
    Other(String),
}

impl EndpointType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::ChatCompletion => "chat_completion",
            Self::ResponseApi => "response_api",
            Self::Other(s) => s,
        }
    }

    /// Lenient parse; unknown values land in `Other`.
    pub fn parse(s: &str) -> Self {
        Self::from_str(s.trim()).unwrap_or_else(|_| Self::Other(s.to_string()))
    }
}

impl From<String> for EndpointType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EndpointType> for String {
    fn from(endpoint: EndpointType) -> Self {
        endpoint.as_str().to_string()
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire protocol used to reach a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Incremental chat-completion protocol.
    Chat,
    /// Item-based response protocol.
    Response,
}

/// Whether a model name matches one of the response-only patterns.
pub fn is_response_model(model: &str) -> bool {
    let name = model.to_ascii_lowercase();
    RESPONSE_MODEL_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// Resolve the protocol for a model. Explicit settings always win.
pub fn select_protocol(model: &str, endpoint: &EndpointType) -> Protocol {
    match endpoint {
        EndpointType::ChatCompletion => Protocol::Chat,
        EndpointType::ResponseApi => Protocol::Response,
        EndpointType::Auto => {
            if is_response_model(model) {
                Protocol::Response
            } else {
                Protocol::Chat
            }
        }
        EndpointType::Other(value) => {
            warn!(model, endpoint = value.as_str(), "Unknown endpoint type, using chat completion");
            Protocol::Chat
        }
    }
}
