//! `vigil ticket` - issue, validate and decode capability tickets.
//!
//! The issuer is configured from `VIGIL_TICKET_*` environment variables.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use vigil_ticket::{
    decode, IssuerConfig, PaymentContext, TicketConstraints, TicketIssuer, TicketOptions,
    TransactionRequest,
};

use super::super::args::{
    TicketArgs, TicketDecodeArgs, TicketIssueArgs, TicketSub, TicketValidateArgs,
};
use crate::cli::input::print_json;
use crate::exit_codes::{BLOCKED, SUCCESS};

pub fn run(args: TicketArgs) -> Result<i32> {
    match args.cmd {
        TicketSub::Issue(a) => cmd_issue(a),
        TicketSub::Validate(a) => cmd_validate(a),
        TicketSub::Decode(a) => cmd_decode(a),
    }
}

fn issuer_from_env() -> Result<TicketIssuer> {
    let config = IssuerConfig::from_env();
    let alg = config.algorithm;
    TicketIssuer::new(config).with_context(|| {
        format!(
            "ticket issuer is not configured for {alg:?} (set VIGIL_TICKET_SECRET or the VIGIL_TICKET_*_KEY_PATH variables)"
        )
    })
}

fn parse_meta(entry: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = entry.split_once('=') else {
        bail!("invalid --meta '{entry}': expected key=value");
    };
    if key.trim().is_empty() {
        bail!("invalid --meta '{entry}': empty key");
    }
    // Numbers, booleans and JSON literals keep their type; everything else is a string.
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

fn cmd_issue(args: TicketIssueArgs) -> Result<i32> {
    let issuer = issuer_from_env()?;

    let mut constraints = TicketConstraints::new(args.max_op_value)
        .with_kill_switch(args.kill_switch)
        .with_payment_proof(!args.no_payment_proof);
    for server in args.servers {
        constraints = constraints.allow_server(server);
    }
    if let Some(n) = args.max_ops_per_hour {
        constraints = constraints.with_max_ops_per_hour(n);
    }
    if !args.geo.is_empty() {
        constraints = constraints.with_geo_restrictions(args.geo);
    }

    let mut options = TicketOptions::new(args.subject, args.level, constraints);
    if let Some(ttl) = args.ttl {
        options = options.with_validity(ttl);
    }
    for entry in &args.meta {
        let (key, value) = parse_meta(entry)?;
        options = options.with_metadata(key, value);
    }

    let token = issuer.generate(&options)?;
    println!("{token}");
    Ok(SUCCESS)
}

fn cmd_validate(args: TicketValidateArgs) -> Result<i32> {
    let issuer = issuer_from_env()?;

    let wants_tx = args.value.is_some()
        || args.server.is_some()
        || args.protocol.is_some()
        || args.tx_hash.is_some();

    let result = if wants_tx {
        let mut tx = TransactionRequest::new(args.value.unwrap_or(0.0));
        tx.target_server = args.server;
        if args.protocol.is_some() || args.tx_hash.is_some() {
            tx = tx.with_payment(PaymentContext {
                protocol: args.protocol.unwrap_or_default(),
                tx_hash: args.tx_hash,
            });
        }
        issuer.validate_transaction(&args.token, &tx)
    } else {
        issuer.validate(&args.token)
    };

    match result {
        Ok(ticket) => {
            print_json(&ticket)?;
            Ok(SUCCESS)
        }
        Err(e) => {
            print_json(&json!({ "code": e.code(), "message": e.to_string() }))?;
            Ok(BLOCKED)
        }
    }
}

fn cmd_decode(args: TicketDecodeArgs) -> Result<i32> {
    match decode(&args.token) {
        Some(ticket) => {
            print_json(&ticket)?;
            Ok(SUCCESS)
        }
        None => {
            eprintln!("error: not a decodable ticket");
            Ok(BLOCKED)
        }
    }
}
