//! Maximum input-token budget derived from a model name.

/// Budget used when no rule matches.
pub const DEFAULT_MAX_INPUT_TOKENS: u32 = 128_000;

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Contains(&'static str),
    Prefix(&'static str),
    /// Every fragment must be present.
    All(&'static [&'static str]),
}

impl Pattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(s) => name.contains(s),
            Self::Prefix(s) => name.starts_with(s),
            Self::All(parts) => parts.iter().all(|p| name.contains(p)),
        }
    }
}

#[derive(Debug)]
struct Rule {
    any_of: &'static [Pattern],
    none_of: &'static [&'static str],
    tokens: u32,
    /// Names that must resolve to this rule; checked in tests.
    #[cfg_attr(not(test), allow(dead_code))]
    samples: &'static [&'static str],
}

impl Rule {
    fn matches(&self, name: &str) -> bool {
        self.any_of.iter().any(|p| p.matches(name))
            && !self.none_of.iter().any(|s| name.contains(s))
    }
}

use Pattern::{All, Contains, Prefix};

/// Ordered most-specific first. The first match wins.
static RULES: &[Rule] = &[
    Rule {
        any_of: &[Contains("gemini-1.5"), Contains("gemini-2.0")],
        none_of: &[],
        tokens: 1_000_000,
        samples: &["gemini-1.5-pro", "gemini-2.0-flash"],
    },
    Rule {
        any_of: &[Contains("claude-3.5")],
        none_of: &[],
        tokens: 200_000,
        samples: &["claude-3.5-sonnet"],
    },
    Rule {
        any_of: &[Contains("gpt-5")],
        none_of: &[],
        tokens: 400_000,
        samples: &["gpt-5", "gpt-5-preview", "gpt-5-mini"],
    },
    Rule {
        any_of: &[Contains("grok-4")],
        none_of: &[],
        tokens: 256_000,
        samples: &["grok-4-0709"],
    },
    Rule {
        any_of: &[Prefix("o1"), Prefix("o3")],
        none_of: &["o1-preview"],
        tokens: 200_000,
        samples: &["o1", "o1-mini", "o3-mini", "o3-pro"],
    },
    Rule {
        any_of: &[
            Contains("-128k"),
            Prefix("o1"),
            Contains("gpt-4o"),
            Contains("gpt-4.1"),
            Contains("grok"),
            Contains("gemini"),
            All(&["gpt-4", "preview"]),
        ],
        none_of: &[],
        tokens: 128_000,
        samples: &[
            "mixtral-128k",
            "o1-preview",
            "gpt-4o-mini",
            "gpt-4.1-nano",
            "grok-2",
            "gemini-pro",
            "gpt-4-1106-preview",
        ],
    },
    Rule {
        any_of: &[Contains("-64k"), Contains("deepseek")],
        none_of: &[],
        tokens: 65_536,
        samples: &["llama-64k", "deepseek-chat"],
    },
    Rule {
        any_of: &[Contains("-32k"), Contains("text-moderation")],
        none_of: &[],
        tokens: 32_768,
        samples: &["gpt-4-32k", "text-moderation-latest"],
    },
    Rule {
        any_of: &[Contains("-16k"), Contains("gpt-3.5-turbo-1106")],
        none_of: &[],
        tokens: 16_384,
        samples: &["gpt-3.5-turbo-16k", "gpt-3.5-turbo-1106"],
    },
    Rule {
        any_of: &[Contains("gpt-4"), Contains("text-embedding")],
        none_of: &[],
        tokens: 8_192,
        samples: &["gpt-4", "gpt-4-0613", "text-embedding-ada-002"],
    },
    Rule {
        any_of: &[Contains("gpt-3.5-turbo")],
        none_of: &[],
        tokens: 4_096,
        samples: &["gpt-3.5-turbo", "gpt-3.5-turbo-0125"],
    },
    Rule {
        any_of: &[Contains("code-davinci-002")],
        none_of: &[],
        tokens: 8_001,
        samples: &["code-davinci-002"],
    },
    Rule {
        any_of: &[Contains("gpt")],
        none_of: &[],
        tokens: 4_097,
        samples: &["gpt-neo"],
    },
    Rule {
        any_of: &[Contains("text-davinci-002"), Contains("text-davinci-003")],
        none_of: &[],
        tokens: 4_097,
        samples: &["text-davinci-002", "text-davinci-003"],
    },
    Rule {
        any_of: &[
            Contains("ada"),
            Contains("babbage"),
            Contains("curie"),
            Contains("davinci"),
        ],
        none_of: &[],
        tokens: 2_049,
        samples: &["ada", "babbage-002", "curie", "davinci-002"],
    },
    Rule {
        any_of: &[Contains("code-cushman-001")],
        none_of: &[],
        tokens: 2_048,
        samples: &["code-cushman-001"],
    },
];

fn matching_rule(name: &str) -> Option<usize> {
    RULES.iter().position(|rule| rule.matches(name))
}

/// Maximum input tokens for a model, matched case-insensitively.
pub fn max_input_tokens(model: &str) -> u32 {
    let name = model.to_ascii_lowercase();
    matching_rule(&name)
        .map(|i| RULES[i].tokens)
        .unwrap_or(DEFAULT_MAX_INPUT_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sample_resolves_to_its_own_rule() {
        for (i, rule) in RULES.iter().enumerate() {
            for sample in rule.samples {
                assert_eq!(
                    matching_rule(sample),
                    Some(i),
                    "sample '{sample}' is shadowed by an earlier rule"
                );
            }
        }
    }

    #[test]
    fn known_budgets() {
        assert_eq!(max_input_tokens("gpt-5-preview"), 400_000);
        assert_eq!(max_input_tokens("claude-3.5-sonnet"), 200_000);
        assert_eq!(max_input_tokens("o3-mini"), 200_000);
        assert_eq!(max_input_tokens("o1-preview"), 128_000);
        assert_eq!(max_input_tokens("Gemini-1.5-Pro"), 1_000_000);
    }

    #[test]
    fn unknown_model_gets_default() {
        assert_eq!(max_input_tokens("unknown-model-x"), DEFAULT_MAX_INPUT_TOKENS);
    }
}
