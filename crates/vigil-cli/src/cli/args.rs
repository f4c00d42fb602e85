use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vigil_ticket::AuditLevel;

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "Trust & safety checks for autonomous agent actions"
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Issue, validate and inspect capability tickets
    Ticket(TicketArgs),
    /// Redact secrets and PII from text
    Redact(RedactArgs),
    /// Scan text for prompt injection
    Guard(GuardArgs),
    /// Check that a URL does not point at an internal destination
    CheckUrl(CheckUrlArgs),
    /// Score a payment for risk
    Settle(SettleArgs),
    Version,
}

#[derive(Parser, Debug)]
pub struct TicketArgs {
    #[command(subcommand)]
    pub cmd: TicketSub,
}

#[derive(Subcommand, Debug)]
pub enum TicketSub {
    /// Sign a new ticket with the configured issuer key
    Issue(TicketIssueArgs),
    /// Verify a ticket, optionally against a transaction
    Validate(TicketValidateArgs),
    /// Print a ticket's payload without verifying it
    Decode(TicketDecodeArgs),
}

#[derive(Args, Debug)]
pub struct TicketIssueArgs {
    #[arg(long)]
    pub subject: String,

    /// bronze, silver, gold or platinum
    #[arg(long)]
    pub level: AuditLevel,

    #[arg(long)]
    pub max_op_value: f64,

    /// Allowed target server (repeatable)
    #[arg(long = "server")]
    pub servers: Vec<String>,

    /// Validity in seconds; defaults to VIGIL_TICKET_TTL_SECS or 300
    #[arg(long, allow_negative_numbers = true)]
    pub ttl: Option<i64>,

    #[arg(long)]
    pub max_ops_per_hour: Option<f64>,

    /// Region code (repeatable)
    #[arg(long = "geo")]
    pub geo: Vec<String>,

    #[arg(long)]
    pub kill_switch: bool,

    /// Do not require a payment proof on transactions
    #[arg(long)]
    pub no_payment_proof: bool,

    /// Metadata entry as key=value (repeatable)
    #[arg(long = "meta")]
    pub meta: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TicketValidateArgs {
    pub token: String,

    /// Transaction value; enables transaction checks
    #[arg(long)]
    pub value: Option<f64>,

    #[arg(long)]
    pub server: Option<String>,

    /// Payment protocol of the transaction
    #[arg(long)]
    pub protocol: Option<String>,

    #[arg(long)]
    pub tx_hash: Option<String>,
}

#[derive(Args, Debug)]
pub struct TicketDecodeArgs {
    pub token: String,
}

#[derive(Args, Debug)]
pub struct RedactArgs {
    /// Policy file (YAML)
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Print the redacted text and findings as JSON
    #[arg(long)]
    pub json: bool,

    /// Text to redact; `-` or absent reads stdin
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct GuardArgs {
    /// Policy file (YAML)
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Text to scan; `-` or absent reads stdin
    pub text: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckUrlArgs {
    pub url: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SettleArgs {
    #[arg(long)]
    pub recipient: String,

    #[arg(long)]
    pub amount: Option<f64>,

    #[arg(long)]
    pub currency: Option<String>,

    /// Counterparty reputation in [0, 1]
    #[arg(long)]
    pub reputation: Option<f64>,

    #[arg(long)]
    pub description: Option<String>,

    /// Recipient to treat as known-bad (repeatable)
    #[arg(long = "known-bad")]
    pub known_bad: Vec<String>,
}
