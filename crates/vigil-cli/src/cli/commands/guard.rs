use anyhow::Result;
use vigil_core::{guard, RuntimeConfig};

use super::super::args::GuardArgs;
use crate::cli::input::{load_policy, print_json, read_text};
use crate::exit_codes::{BLOCKED, SUCCESS};

/// Lexical and structural checks only; the CLI has no classifier to deep-scan with.
pub async fn run(args: GuardArgs) -> Result<i32> {
    let policy = load_policy(args.policy.as_deref())?;
    let text = read_text(args.text.as_deref())?;
    let options = RuntimeConfig::from_env().guard_options();

    let result = guard(&text, Some(&policy), &options).await;
    print_json(&result)?;
    Ok(if result.is_blocked() { BLOCKED } else { SUCCESS })
}
