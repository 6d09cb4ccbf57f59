//! In-text function calls for models without native function calling.
//!
//! The model is told to emit fenced blocks with the info string `function`:
//!
//! ````text
//! ```function
//! {"name": "lookup", "parameters": {"q": "rust"}}
//! ```
//! ````
//!
//! A block may hold one object or an array of objects. `id` is optional.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::types::{FunctionInvocation, ToolDefinition};

static FUNCTION_BLOCK: OnceLock<Regex> = OnceLock::new();

fn function_block() -> &'static Regex {
    FUNCTION_BLOCK.get_or_init(|| {
        Regex::new(r"(?s)```function[ \t]*\r?\n(.*?)```").expect("function block pattern is valid")
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CallBlock {
    One(CallEntry),
    Many(Vec<CallEntry>),
}

#[derive(Deserialize)]
struct CallEntry {
    name: String,
    #[serde(default, alias = "arguments")]
    parameters: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<String>,
}

impl CallEntry {
    fn into_invocation(self) -> Option<FunctionInvocation> {
        if self.name.trim().is_empty() {
            return None;
        }
        Some(FunctionInvocation {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_call_id),
            name: self.name,
            parameters: self
                .parameters
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        })
    }
}

fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Pull function blocks out of an answer.
///
/// Returns the visible text with parsed blocks removed, plus the
/// invocations in order of appearance. Blocks that do not parse stay in the
/// text. With no parsed blocks the answer comes back unchanged.
pub fn extract(answer: &str) -> (String, Vec<FunctionInvocation>) {
    let mut invocations = Vec::new();
    let stripped = function_block().replace_all(answer, |caps: &Captures| {
        match serde_json::from_str::<CallBlock>(caps[1].trim()) {
            Ok(block) => {
                let entries = match block {
                    CallBlock::One(entry) => vec![entry],
                    CallBlock::Many(entries) => entries,
                };
                invocations.extend(entries.into_iter().filter_map(CallEntry::into_invocation));
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "Leaving malformed function block in answer");
                caps[0].to_string()
            }
        }
    });

    if invocations.is_empty() {
        return (answer.to_string(), invocations);
    }
    (stripped.trim().to_string(), invocations)
}

/// Instruction text describing the available functions and the block format.
pub fn tool_instructions(tools: &[ToolDefinition]) -> String {
    let definitions = serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You can call the functions listed below. To call one, reply with a fenced code \
block whose info string is `function` containing a JSON object of the form \
{{\"name\": \"<function name>\", \"parameters\": {{...}}}}. To call several, put an \
array of such objects in the block. Do not describe the call in prose.\n\n\
Available functions:\n```json\n{definitions}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn extracts_single_block_and_strips_it() {
        let answer = "Let me check.\n```function\n{\"name\":\"lookup\",\"parameters\":{\"q\":\"rust\"},\"id\":\"c1\"}\n```\n";
        let (text, invocations) = extract(answer);
        assert_eq!(text, "Let me check.");
        assert_eq!(
            invocations,
            vec![FunctionInvocation {
                id: "c1".into(),
                name: "lookup".into(),
                parameters: json!({"q": "rust"}),
            }]
        );
    }

    #[test]
    fn array_block_yields_many_with_generated_ids() {
        let answer = "```function\n[{\"name\":\"a\"},{\"name\":\"b\",\"arguments\":{\"x\":1}}]\n```";
        let (text, invocations) = extract(answer);
        assert_eq!(text, "");
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].parameters, json!({}));
        assert_eq!(invocations[1].parameters, json!({"x": 1}));
        assert!(invocations[0].id.starts_with("call_"));
        assert_ne!(invocations[0].id, invocations[1].id);
    }

    #[test]
    fn answer_without_blocks_is_untouched() {
        let answer = "  plain answer\n```rust\nfn main() {}\n```\n";
        let (text, invocations) = extract(answer);
        assert_eq!(text, answer);
        assert!(invocations.is_empty());
    }

    #[test]
    fn malformed_block_stays_visible() {
        let answer = "```function\n{not json}\n```";
        let (text, invocations) = extract(answer);
        assert_eq!(text, answer);
        assert!(invocations.is_empty());
    }

    #[test]
    fn instructions_list_definitions() {
        let text = tool_instructions(&[ToolDefinition::new(
            "lookup",
            "Search the index",
            json!({"type": "object"}),
        )]);
        assert!(text.contains("`function`"));
        assert!(text.contains("\"name\": \"lookup\""));
        assert!(text.contains("Search the index"));
    }
}
