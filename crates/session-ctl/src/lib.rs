//! GNOME Session Control
//!
//! Session monitor and one-shot session actions behind `gnome-session-ctl`.

mod monitor;
mod signals;

pub use monitor::{monitor_session, Monitor, MonitorExit, WATCHING_STATUS};
pub use signals::{wait_for_stop, StopSignal};
