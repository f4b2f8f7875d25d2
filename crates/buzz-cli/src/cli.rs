use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "buzz")]
#[command(about = "Keep up with GitHub notifications from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Keep notifications in sync and act on them interactively
    Watch {
        /// Override the sync cycle in seconds
        #[arg(long, value_name = "SECONDS")]
        poll_interval: Option<u64>,
    },
    /// Fetch and list recent notifications
    List {
        /// Number of notifications to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark notifications as read on GitHub
    Read {
        /// Notification thread ids
        ids: Vec<String>,
        /// Mark every notification of this repository id as read
        #[arg(long, value_name = "ID", conflicts_with = "all")]
        repository: Option<u64>,
        /// Mark every notification as read
        #[arg(long)]
        all: bool,
    },
    /// Manage the CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// GitHub personal access token
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// GitHub API base URL (GitHub Enterprise: https://HOST/api/v3)
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Sync cycle in seconds
        #[arg(long, value_name = "SECONDS")]
        poll_interval: Option<u64>,
        /// Timeout for each GitHub request in seconds
        #[arg(long, value_name = "SECONDS")]
        request_timeout: Option<u64>,
    },
    /// Print the effective configuration (token redacted)
    Show,
    /// Remove the stored token
    Logout,
}
