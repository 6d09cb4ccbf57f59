//! Tool/function bridge: plugin dispatch and function-call normalization.

pub mod bridge;
pub mod plugin;
pub mod text_convention;

pub use bridge::{
    invocation_record, normalize, parse_invocation_record, process_functions, result_title,
    NormalizedAnswer, ToolMode,
};
pub use plugin::{FnPlugin, Plugin, PluginExecutor, PluginOutput, PluginRegistry};
pub use text_convention::tool_instructions;
