//! Buzz CLI - GitHub notifications from the terminal
//!
//! Runs the notification sync loop in the foreground and exposes the read,
//! unread and archive actions as one-shot commands or interactive input.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::list::run_list;
use crate::commands::read::run_read;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("buzz=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { poll_interval } => run_watch(poll_interval).await?,
        Commands::List {
            limit,
            unread,
            json,
        } => run_list(limit, unread, json).await?,
        Commands::Read {
            ids,
            repository,
            all,
        } => run_read(&ids, repository, all).await?,
        Commands::Config { command } => run_config(command)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
