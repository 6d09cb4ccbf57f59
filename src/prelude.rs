//! Convenience re-exports for common use.

pub use crate::config::{EngineConfig, ServiceSettings};
pub use crate::context::{MemoryTranscript, QueryRegistry, TranscriptSink};
pub use crate::engine::{
    QueryEngine, QueryEvent, QueryEventPayload, QueryOutcome, QueryRequest, QueryStatus,
};
pub use crate::error::{QueryError, Result};
pub use crate::models::{EndpointType, ModelFeatures, ModelSettings, Protocol};
pub use crate::provider::{ChatProvider, ChatRequest, ResponseProvider, ResponseRequest};
pub use crate::tools::{FnPlugin, Plugin, PluginExecutor, PluginOutput, PluginRegistry};
pub use crate::types::{
    ContentPart, ConversationMessage, FinishReason, ImageDetail, Role, ToolDefinition,
    TranscriptMessage,
};
