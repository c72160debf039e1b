//! Init system error types

use thiserror::Error;

/// Errors that can occur while talking to the service manager or init system
#[derive(Debug, Error)]
pub enum InitError {
    /// D-Bus error
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// Could not reach the session bus
    #[error("Couldn't connect to session bus: {0}")]
    Connect(#[source] zbus::Error),

    /// Failed to spawn a legacy init command
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Legacy command line is empty or malformed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}
