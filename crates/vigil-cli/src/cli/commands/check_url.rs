use anyhow::Result;
use vigil_core::{check_url, RuntimeConfig, SystemResolver};

use super::super::args::CheckUrlArgs;
use crate::cli::input::print_json;
use crate::exit_codes::{BLOCKED, SUCCESS};

pub async fn run(args: CheckUrlArgs) -> Result<i32> {
    let timeout = RuntimeConfig::from_env().dns_timeout;
    let result = check_url(&args.url, &SystemResolver, timeout).await;

    if args.json {
        print_json(&result)?;
    } else if result.safe {
        println!("safe");
    } else {
        println!("unsafe: {}", result.reason.as_deref().unwrap_or("unknown"));
    }
    Ok(if result.safe { SUCCESS } else { BLOCKED })
}
