use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of every classifying layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Pass,
    Block,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Block => "block",
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation types emitted by the guard and the tool policy check.
///
/// The wire names are the keys a policy's `cweMap` is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Violation {
    PromptInjection,
    PotentialObfuscation,
    LlmFlaggedInjection,
    ToolBlocked,
    ToolNotAllowed,
    ToolValidationFailed,
}

impl Violation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromptInjection => "prompt-injection",
            Self::PotentialObfuscation => "potential-obfuscation",
            Self::LlmFlaggedInjection => "llm-flagged-injection",
            Self::ToolBlocked => "tool-blocked",
            Self::ToolNotAllowed => "tool-not-allowed",
            Self::ToolValidationFailed => "tool-validation-failed",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn join_violations<'a>(violations: impl IntoIterator<Item = &'a Violation>) -> String {
    violations
        .into_iter()
        .map(Violation::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
