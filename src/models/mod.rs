//! Model settings, feature flags and endpoint selection.

pub mod budget;
pub mod selector;

pub use budget::max_input_tokens;
pub use selector::{select_protocol, EndpointType, Protocol};

use serde::{Deserialize, Serialize};

/// Instruction added for o1-family models, which lack a code-formatting default.
pub const O1_CODE_BLOCK_INSTRUCTIONS: &str =
    "Reply using a markdown code block for any code included.";

/// Describes what a model can do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelFeatures {
    pub streaming: bool,
    pub system_messages: bool,
    pub function_calling: bool,
    pub chat_support: bool,
}

impl Default for ModelFeatures {
    fn default() -> Self {
        Self::full()
    }
}

impl ModelFeatures {
    /// Every feature enabled.
    pub fn full() -> Self {
        Self {
            streaming: true,
            system_messages: true,
            function_calling: true,
            chat_support: true,
        }
    }

    /// Chat only, nothing else.
    pub fn chat_only() -> Self {
        Self {
            streaming: false,
            system_messages: false,
            function_calling: false,
            chat_support: true,
        }
    }
}

/// Per-model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSettings {
    pub name: String,
    #[serde(default)]
    pub endpoint_type: EndpointType,
    /// Zero means "derive from the model name".
    #[serde(default)]
    pub max_input_tokens: u32,
    #[serde(default)]
    pub features: ModelFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ModelSettings {
    /// Settings with features detected from the model name.
    pub fn detected(name: impl Into<String>) -> Self {
        let name = name.into();
        let (features, instructions) = detect_features(&name);
        Self {
            name,
            endpoint_type: EndpointType::Auto,
            max_input_tokens: 0,
            features,
            instructions: instructions.map(str::to_string),
        }
    }

    /// Configured budget if set, otherwise the name heuristic.
    pub fn effective_max_input_tokens(&self) -> u32 {
        if self.max_input_tokens > 0 {
            self.max_input_tokens
        } else {
            max_input_tokens(&self.name)
        }
    }

    pub fn protocol(&self) -> Protocol {
        select_protocol(&self.name, &self.endpoint_type)
    }
}

/// Guess feature flags and extra instructions from a model name.
pub fn detect_features(model: &str) -> (ModelFeatures, Option<&'static str>) {
    let name = model.to_ascii_lowercase();
    if name.starts_with("o1-preview") {
        return (ModelFeatures::chat_only(), None);
    }
    if name.starts_with("o1") {
        let features = ModelFeatures {
            system_messages: true,
            function_calling: true,
            ..ModelFeatures::chat_only()
        };
        return (features, Some(O1_CODE_BLOCK_INSTRUCTIONS));
    }
    if name.contains("gemini") {
        let features = ModelFeatures {
            system_messages: true,
            ..ModelFeatures::chat_only()
        };
        return (features, None);
    }
    (ModelFeatures::full(), None)
}
