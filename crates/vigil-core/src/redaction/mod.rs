//! Span-based redaction.
//!
//! All rules (caller rules first, then the built-in table) are scanned over the
//! original input. Candidates are ordered by start, then by length descending,
//! and a single left-to-right walk keeps the first candidate at or after the
//! write cursor. A shorter match that starts earlier is never displaced by a
//! longer one that starts later, and findings never overlap.

mod patterns;

use crate::policy::GuardPolicy;
use serde::Serialize;
use std::cmp::Reverse;

/// One redacted span. Offsets are byte offsets into the original input, half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub start: usize,
    pub end: usize,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedactionResult {
    pub redacted: String,
    pub findings: Vec<Finding>,
}

impl RedactionResult {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

struct Candidate<'a> {
    start: usize,
    end: usize,
    kind: &'a str,
    replacement: &'a str,
}

pub fn redact(input: &str, policy: Option<&GuardPolicy>) -> RedactionResult {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    if let Some(rules) = policy.and_then(|p| p.redaction_patterns.as_ref()) {
        for rule in rules {
            let spans = rule
                .pattern
                .find_iter(input)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()));
            collect(&mut candidates, spans, &rule.kind, rule.replacement());
        }
    }

    if policy.is_none_or(GuardPolicy::builtin_redactions_enabled) {
        for rule in patterns::BUILTIN_RULES.iter() {
            collect(&mut candidates, rule.spans(input), rule.kind, rule.replacement);
        }
    }

    // Stable: equal spans keep rule order.
    candidates.sort_by_key(|c| (c.start, Reverse(c.end - c.start)));

    let mut redacted = String::with_capacity(input.len());
    let mut findings = Vec::new();
    let mut cursor = 0;

    for c in candidates {
        if c.start < cursor {
            continue;
        }
        redacted.push_str(&input[cursor..c.start]);
        redacted.push_str(c.replacement);
        findings.push(Finding {
            kind: c.kind.to_string(),
            start: c.start,
            end: c.end,
            value: input[c.start..c.end].to_string(),
        });
        cursor = c.end;
    }
    redacted.push_str(&input[cursor..]);

    if !findings.is_empty() {
        tracing::debug!(
            event = "redaction_applied",
            findings = findings.len(),
            kinds = ?findings.iter().map(|f| f.kind.as_str()).collect::<Vec<_>>(),
            "sensitive spans redacted"
        );
    }

    RedactionResult { redacted, findings }
}

fn collect<'a>(
    out: &mut Vec<Candidate<'a>>,
    spans: impl IntoIterator<Item = (usize, usize)>,
    kind: &'a str,
    replacement: &'a str,
) {
    out.extend(spans.into_iter().map(|(start, end)| Candidate {
        start,
        end,
        kind,
        replacement,
    }));
}
