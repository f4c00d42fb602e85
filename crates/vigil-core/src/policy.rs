//! Caller-supplied policy shared by every pipeline layer.
//!
//! Every field is optional: `None` disables the corresponding check, while an
//! empty collection is a real (and usually strict) setting. An empty allowlist
//! allows no tool at all.

use crate::types::Violation;
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Replacement used by caller rules that do not name one.
pub const DEFAULT_REPLACEMENT: &str = "[REDACTED]";

/// A single redaction rule: matches of `pattern` are replaced and reported as `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "de_regex")]
    pub pattern: Regex,
    #[serde(default)]
    pub replacement: Option<String>,
}

impl RedactionRule {
    pub fn new(
        kind: impl Into<String>,
        pattern: &str,
        replacement: Option<&str>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            kind: kind.into(),
            pattern: Regex::new(pattern)?,
            replacement: replacement.map(str::to_string),
        })
    }

    pub fn replacement(&self) -> &str {
        self.replacement.as_deref().unwrap_or(DEFAULT_REPLACEMENT)
    }
}

/// Verdict of a custom tool validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVerdict {
    Allow,
    /// Block with a reason that is surfaced verbatim.
    Deny(String),
    /// Block with the generic policy-failure reason.
    DenyGeneric,
}

/// Custom per-call tool check plugged into a [`GuardPolicy`].
pub trait ToolValidator: Send + Sync {
    fn validate(&self, tool: &str, args: &Value) -> ToolVerdict;
}

impl<F> ToolValidator for F
where
    F: Fn(&str, &Value) -> ToolVerdict + Send + Sync,
{
    fn validate(&self, tool: &str, args: &Value) -> ToolVerdict {
        self(tool, args)
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardPolicy {
    /// Extra injection patterns, checked together with the built-in set.
    #[serde(default, deserialize_with = "de_regex_list")]
    pub injection_patterns: Option<Vec<Regex>>,

    /// Extra redaction rules, merged with the built-in set.
    #[serde(default)]
    pub redaction_patterns: Option<Vec<RedactionRule>>,

    /// `Some(false)` runs only `redaction_patterns`.
    #[serde(default)]
    pub builtin_redactions: Option<bool>,

    #[serde(default)]
    pub tool_blocklist: Option<Vec<String>>,

    #[serde(default)]
    pub tool_allowlist: Option<Vec<String>>,

    /// Not loadable from YAML: validators are code.
    #[serde(skip)]
    pub tool_validator: Option<Arc<dyn ToolValidator>>,

    /// Violation type (kebab-case) -> CWE identifier.
    #[serde(default)]
    pub cwe_map: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPolicy")
            .field(
                "injection_patterns",
                &self
                    .injection_patterns
                    .as_ref()
                    .map(|p| p.iter().map(Regex::as_str).collect::<Vec<_>>()),
            )
            .field("redaction_patterns", &self.redaction_patterns)
            .field("builtin_redactions", &self.builtin_redactions)
            .field("tool_blocklist", &self.tool_blocklist)
            .field("tool_allowlist", &self.tool_allowlist)
            .field("tool_validator", &self.tool_validator.is_some())
            .field("cwe_map", &self.cwe_map)
            .finish()
    }
}

impl GuardPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let policy: GuardPolicy =
            serde_yaml::from_str(content).context("failed to parse guard policy YAML")?;
        Ok(policy)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid policy file: {}", path.display()))
    }

    pub fn with_injection_patterns(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.injection_patterns
            .get_or_insert_with(Vec::new)
            .extend(compiled);
        Ok(self)
    }

    pub fn with_redaction_rule(mut self, rule: RedactionRule) -> Self {
        self.redaction_patterns
            .get_or_insert_with(Vec::new)
            .push(rule);
        self
    }

    pub fn without_builtin_redactions(mut self) -> Self {
        self.builtin_redactions = Some(false);
        self
    }

    pub fn with_blocklist<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_blocklist = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_allowlist<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_allowlist = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_validator(mut self, validator: impl ToolValidator + 'static) -> Self {
        self.tool_validator = Some(Arc::new(validator));
        self
    }

    pub fn with_cwe_map(mut self, map: BTreeMap<String, String>) -> Self {
        self.cwe_map = Some(map);
        self
    }

    pub fn with_default_cwe_map(self) -> Self {
        self.with_cwe_map(default_cwe_map())
    }

    pub fn builtin_redactions_enabled(&self) -> bool {
        self.builtin_redactions.unwrap_or(true)
    }

    pub fn cwe_for(&self, violation: Violation) -> Option<&str> {
        self.cwe_map
            .as_ref()
            .and_then(|m| m.get(violation.as_str()))
            .map(String::as_str)
    }
}

/// CWE mapping used by [`GuardPolicy::with_default_cwe_map`].
pub fn default_cwe_map() -> BTreeMap<String, String> {
    [
        (Violation::PromptInjection, "CWE-1427"),
        (Violation::LlmFlaggedInjection, "CWE-1427"),
        (Violation::PotentialObfuscation, "CWE-116"),
        (Violation::ToolBlocked, "CWE-862"),
        (Violation::ToolNotAllowed, "CWE-862"),
        (Violation::ToolValidationFailed, "CWE-20"),
    ]
    .into_iter()
    .map(|(v, cwe)| (v.as_str().to_string(), cwe.to_string()))
    .collect()
}

fn de_regex<'de, D: Deserializer<'de>>(d: D) -> Result<Regex, D::Error> {
    let raw = String::deserialize(d)?;
    Regex::new(&raw).map_err(serde::de::Error::custom)
}

fn de_regex_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Regex>>, D::Error> {
    let raw: Option<Vec<String>> = Option::deserialize(d)?;
    raw.map(|list| {
        list.iter()
            .map(|p| Regex::new(p).map_err(serde::de::Error::custom))
            .collect()
    })
    .transpose()
}
