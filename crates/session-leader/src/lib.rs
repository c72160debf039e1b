//! GNOME Session Leader
//!
//! Owns the write end of the leader FIFO for the lifetime of the session.
//! Termination signals become a shutdown request to the session monitor;
//! once the monitor has gone away the leader waits for session services to
//! finish stopping before it exits.

mod leader;
mod signals;
mod watcher;

pub use leader::{Leader, LeaderEvent, LeaderExit};
pub use signals::{termination_channel, TerminationSignal, TerminationSignals};
pub use watcher::{UnitWatcher, WatchOutcome, WatchState};
