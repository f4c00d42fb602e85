//! Trust & safety pipeline for autonomous agent actions.
//!
//! Layers, leaf-first: [`redaction`], [`guard`], [`network`], [`tool_policy`],
//! composed by [`wrapper`]; [`settlement`] scores payments. All of them read a
//! shared [`policy::GuardPolicy`].

pub mod classifier;
pub mod config;
pub mod guard;
pub mod network;
pub mod policy;
pub mod redaction;
pub mod settlement;
pub mod tool_policy;
pub mod types;
pub mod wrapper;

pub use classifier::{Classifier, ClassifierVerdict, ProviderError};
pub use config::RuntimeConfig;
pub use guard::{guard, GuardOptions, GuardResult};
pub use network::{check_url, Resolver, SystemResolver, UrlCheck};
pub use policy::{GuardPolicy, RedactionRule, ToolValidator, ToolVerdict};
pub use redaction::{redact, Finding, RedactionResult};
pub use settlement::{settlement_guard, RiskAssessment, SettlementMeta, SettlementOptions};
pub use tool_policy::{guard_tool, ToolCheck};
pub use types::{Classification, Violation};
pub use wrapper::{wrap_agent_tool, GuardedTool, WrapError, WrapOptions};
