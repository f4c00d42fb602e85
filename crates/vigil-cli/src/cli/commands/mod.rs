use super::args::*;

pub mod check_url;
pub mod guard;
pub mod redact;
pub mod settle;
pub mod ticket;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Ticket(args) => ticket::run(args),
        Command::Redact(args) => redact::run(args),
        Command::Guard(args) => guard::run(args).await,
        Command::CheckUrl(args) => check_url::run(args).await,
        Command::Settle(args) => settle::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
