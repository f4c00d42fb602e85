use anyhow::Result;
use vigil_core::redact;

use super::super::args::RedactArgs;
use crate::cli::input::{load_policy, print_json, read_text};
use crate::exit_codes::SUCCESS;

pub fn run(args: RedactArgs) -> Result<i32> {
    let policy = load_policy(args.policy.as_deref())?;
    let text = read_text(args.text.as_deref())?;
    let result = redact(&text, Some(&policy));

    if args.json {
        print_json(&result)?;
    } else if result.redacted.ends_with('\n') {
        print!("{}", result.redacted);
    } else {
        println!("{}", result.redacted);
    }
    Ok(SUCCESS)
}
