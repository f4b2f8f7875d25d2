//! Error types for buzz-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using buzz-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in buzz-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No credential is present for the current session
    #[error("Authentication required: no GitHub credential is available")]
    Authentication,

    /// A remote call exceeded its time budget
    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The remote rejected the call or the network failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// reqwest error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session changed while the call was in flight
    #[error("{operation} result discarded: the session changed")]
    SessionChanged { operation: &'static str },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lookup miss (notification, repository)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the sync loop may simply try again on its next cycle.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(_) | Self::Http(_) | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_operation() {
        let error = Error::Timeout {
            operation: "FETCH_NOTIFICATIONS",
            after: Duration::from_secs(10),
        };
        assert_eq!(error.to_string(), "FETCH_NOTIFICATIONS timed out after 10s");
        assert!(error.is_recoverable());
    }

    #[test]
    fn authentication_is_not_recoverable() {
        assert!(!Error::Authentication.is_recoverable());
        assert!(Error::Transport("boom".to_string()).is_recoverable());
    }
}
