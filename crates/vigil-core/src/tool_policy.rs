use crate::policy::{GuardPolicy, ToolVerdict};
use crate::types::{join_violations, Violation};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCheck {
    pub allowed: bool,
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolCheck {
    fn allow() -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
            reason: None,
        }
    }

    fn deny(tool: &str, violations: Vec<Violation>, reason: String) -> Self {
        tracing::warn!(
            event = "tool_blocked",
            tool,
            violations = %join_violations(&violations),
            "tool call rejected by policy"
        );
        Self {
            allowed: false,
            violations,
            reason: Some(reason),
        }
    }
}

/// Decide whether `tool` may be called with `args`.
///
/// Blocklist, allowlist and validator verdicts accumulate. A validator that
/// denies with its own reason ends the check and its reason is reported verbatim.
pub fn guard_tool(tool: &str, args: &Value, policy: Option<&GuardPolicy>) -> ToolCheck {
    let Some(policy) = policy else {
        return ToolCheck::allow();
    };

    let mut violations = Vec::new();

    if let Some(blocklist) = &policy.tool_blocklist {
        if blocklist.iter().any(|t| t == tool) {
            violations.push(Violation::ToolBlocked);
        }
    }

    if let Some(allowlist) = &policy.tool_allowlist {
        if !allowlist.iter().any(|t| t == tool) {
            violations.push(Violation::ToolNotAllowed);
        }
    }

    if let Some(validator) = &policy.tool_validator {
        match validator.validate(tool, args) {
            ToolVerdict::Allow => {}
            ToolVerdict::Deny(reason) => {
                violations.push(Violation::ToolValidationFailed);
                return ToolCheck::deny(tool, violations, reason);
            }
            ToolVerdict::DenyGeneric => violations.push(Violation::ToolValidationFailed),
        }
    }

    if violations.is_empty() {
        tracing::debug!(event = "tool_allowed", tool, "tool call allowed");
        return ToolCheck::allow();
    }

    let reason = if violations.contains(&Violation::ToolBlocked) {
        format!("Tool '{tool}' is blocked by policy")
    } else {
        format!(
            "Tool '{tool}' failed policy checks ({})",
            join_violations(&violations)
        )
    };
    ToolCheck::deny(tool, violations, reason)
}
