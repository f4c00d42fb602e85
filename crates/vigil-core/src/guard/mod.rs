//! Layered input guard: lexical patterns, bracket-density heuristic, then an
//! optional fail-open semantic deep scan.

mod patterns;

use crate::classifier::{
    classify_with_timeout, report_provider_error, Classifier, ErrorCallback, ProviderError,
    DEFAULT_CLASSIFIER_TIMEOUT,
};
use crate::policy::GuardPolicy;
use crate::types::{join_violations, Classification, Violation};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Inputs with more brackets than this are treated as obfuscated payloads.
pub const BRACKET_THRESHOLD: usize = 20;

#[derive(Clone)]
pub struct GuardOptions {
    pub deep_scan: bool,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub timeout: Duration,
    pub on_error: Option<ErrorCallback>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            deep_scan: false,
            classifier: None,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
            on_error: None,
        }
    }
}

impl fmt::Debug for GuardOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardOptions")
            .field("deep_scan", &self.deep_scan)
            .field("classifier", &self.classifier.is_some())
            .field("timeout", &self.timeout)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl GuardOptions {
    pub fn with_deep_scan(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.deep_scan = true;
        self.classifier = Some(classifier);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_callback(mut self, cb: ErrorCallback) -> Self {
        self.on_error = Some(cb);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardResult {
    pub classification: Classification,
    pub violation_types: BTreeSet<Violation>,
    pub cwe_codes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_provider_error"
    )]
    pub provider_error: Option<ProviderError>,
    pub usage_estimate: usize,
}

impl GuardResult {
    pub fn is_blocked(&self) -> bool {
        self.classification.is_block()
    }
}

fn serialize_provider_error<S: Serializer>(
    err: &Option<ProviderError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.collect_str(e),
        None => s.serialize_none(),
    }
}

pub fn count_brackets(input: &str) -> usize {
    input
        .chars()
        .filter(|&c| matches!(c, '[' | ']' | '{' | '}'))
        .count()
}

pub async fn guard(
    input: &str,
    policy: Option<&GuardPolicy>,
    options: &GuardOptions,
) -> GuardResult {
    let mut violations = BTreeSet::new();
    let mut reasoning = None;
    let mut provider_error = None;

    // Lexical
    let builtin_hit = patterns::first_builtin_match(input);
    let custom_hit = policy
        .and_then(|p| p.injection_patterns.as_ref())
        .is_some_and(|pats| pats.iter().any(|re| re.is_match(input)));
    if builtin_hit.is_some() || custom_hit {
        tracing::debug!(
            event = "guard_pattern_hit",
            pattern = builtin_hit.unwrap_or("policy"),
            "injection pattern matched"
        );
        violations.insert(Violation::PromptInjection);
    }

    // Heuristic
    let brackets = count_brackets(input);
    if brackets > BRACKET_THRESHOLD {
        tracing::debug!(event = "guard_obfuscation", brackets, "bracket density exceeded");
        violations.insert(Violation::PotentialObfuscation);
    }

    // Deep scan, fail-open
    if options.deep_scan {
        if let Some(classifier) = options.classifier.as_deref() {
            match classify_with_timeout(classifier, input, options.timeout).await {
                Ok(verdict) => {
                    if verdict.classification.is_block() {
                        violations.insert(Violation::LlmFlaggedInjection);
                    }
                    if !verdict.reasoning.is_empty() {
                        reasoning = Some(verdict.reasoning);
                    }
                }
                Err(e) => {
                    report_provider_error("guard", &e, options.on_error.as_ref());
                    provider_error = Some(e);
                }
            }
        }
    }

    let classification = if violations.is_empty() {
        Classification::Pass
    } else {
        Classification::Block
    };

    let cwe_codes = policy
        .map(|p| {
            violations
                .iter()
                .filter_map(|v| p.cwe_for(*v).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if classification.is_block() {
        tracing::warn!(
            event = "guard_block",
            violations = %join_violations(&violations),
            "input blocked by guard"
        );
    } else {
        tracing::debug!(event = "guard_pass", "input passed guard");
    }

    GuardResult {
        classification,
        violation_types: violations,
        cwe_codes,
        reasoning,
        provider_error,
        usage_estimate: input.chars().count().div_ceil(4),
    }
}
