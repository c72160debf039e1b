//! Session leader FIFO channel
//!
//! A one-way named pipe between the session leader (writer) and the
//! session monitor (reader). The leader writes a single sentinel byte to
//! request shutdown; the monitor treats the leader closing the pipe
//! exactly like that byte.

mod error;
mod fifo;

pub use error::FifoError;
pub use fifo::{create, fifo_path, verify_fifo, FifoEvent, FifoReader, FifoWriter, SENTINEL};
