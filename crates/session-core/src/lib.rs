//! GNOME Session Core Components
//!
//! Shared pieces used by both the session leader and the session monitor:
//! configuration, session environment normalisation and service-manager
//! status notifications.

mod config;
mod environment;
mod error;
mod notify;

pub use config::{CtlConfig, InitBackend, DEFAULT_FIFO_NAME};
pub use environment::{SessionEnvironment, GREETER_USER};
pub use error::CoreError;
pub use notify::{NotifyState, StatusNotifier, SystemdNotifier};
