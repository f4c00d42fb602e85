use anyhow::{bail, Result};
use vigil_core::{settlement_guard, RuntimeConfig, SettlementMeta};

use super::super::args::SettleArgs;
use crate::cli::input::print_json;
use crate::exit_codes::{BLOCKED, SUCCESS};

pub async fn run(args: SettleArgs) -> Result<i32> {
    if let Some(rep) = args.reputation {
        if !(0.0..=1.0).contains(&rep) {
            bail!("--reputation must be between 0 and 1, got {rep}");
        }
    }
    if let Some(amount) = args.amount {
        if !amount.is_finite() || amount < 0.0 {
            bail!("--amount must be a non-negative number, got {amount}");
        }
    }

    let meta = SettlementMeta {
        recipient: args.recipient,
        amount: args.amount,
        currency: args.currency,
        counterparty_reputation: args.reputation,
        service_description: args.description,
    };
    let mut options = RuntimeConfig::from_env().settlement_options();
    options.known_bad_recipients = args.known_bad;

    let assessment = settlement_guard(&meta, &options).await;
    print_json(&assessment)?;
    Ok(if assessment.is_blocked() { BLOCKED } else { SUCCESS })
}
