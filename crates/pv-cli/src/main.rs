//! Provisio CLI - provision a hosted Postgres schema over its HTTP API

use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::common::ExitCode;
use commands::{install, plan, probe, verify};

/// Log to stderr at `warn` (`debug` when verbose); `RUST_LOG` wins
fn init_logging(verbose: bool) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let level = if verbose { "debug" } else { "warn" };
    Logger::try_with_env_or_str(level)?
        .format(flexi_logger::default_format)
        .start()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logger = match init_logging(cli.global.verbose) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("[warn] Logging disabled: {}", err);
            None
        }
    };

    let result = match &cli.command {
        cli::Commands::Install(args) => install::execute(args, &cli.global).await,
        cli::Commands::Plan(args) => plan::execute(args, &cli.global).await,
        cli::Commands::Probe => probe::execute(&cli.global).await,
        cli::Commands::Verify => verify::execute(&cli.global).await,
    };

    if let Err(err) = result {
        let code = match err.downcast_ref::<ExitCode>() {
            Some(ExitCode(code)) => *code,
            None => {
                eprintln!("Error: {:#}", err);
                1
            }
        };
        std::process::exit(code);
    }
}
