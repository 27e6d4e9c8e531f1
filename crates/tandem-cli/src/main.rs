//! Tandem CLI - Command-line client for shared session timers
//!
//! Start, pause, reset, and watch a stopwatch that every participant of a
//! session sees the same way.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_db_path, resolve_settings};
use crate::commands::reset::run_reset;
use crate::commands::status::run_status;
use crate::commands::toggle::run_toggle;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "tandem=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let settings = resolve_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Status { session, json } => {
            run_status(&session, json, &db_path, settings).await?;
        }
        Commands::Toggle { session, json } => {
            run_toggle(&session, json, &db_path, settings).await?;
        }
        Commands::Reset { session, json } => {
            run_reset(&session, json, &db_path, settings).await?;
        }
        Commands::Watch { session } => run_watch(&session, &db_path, settings).await?,
    }

    Ok(())
}
