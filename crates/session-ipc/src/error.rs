//! FIFO error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur on the leader FIFO
#[derive(Debug, Error)]
pub enum FifoError {
    /// IO error on an open descriptor
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// mkfifo failed for a reason other than the FIFO already existing
    #[error("Failed to create FIFO {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    /// open(2) on the FIFO path failed
    #[error("Failed to open FIFO {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Something other than a named pipe lives at the FIFO path
    #[error("{0} is not a FIFO")]
    NotAFifo(PathBuf),

    /// The sentinel byte was not written
    #[error("Short write on leader FIFO")]
    ShortWrite,
}
