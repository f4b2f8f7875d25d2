use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] buzz_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Notification ID cannot be empty")]
    EmptyNotificationId,
    #[error("Nothing to mark as read. Pass thread ids, --repository or --all")]
    NothingToRead,
    #[error("Unknown command: {0}. Try `help`")]
    UnknownCommand(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No GitHub token configured. Run `buzz config init --token <TOKEN>` or set GITHUB_TOKEN."
    )]
    NotLoggedIn,
}
