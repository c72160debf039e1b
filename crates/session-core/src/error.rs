//! Core error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// No runtime directory could be determined for the leader FIFO
    #[error("No user runtime directory available (XDG_RUNTIME_DIR unset)")]
    NoRuntimeDir,
}
