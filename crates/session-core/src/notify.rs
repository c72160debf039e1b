//! Service manager status notifications
//!
//! Speaks the `sd_notify` datagram protocol through the `sd-notify` crate:
//! - Ready notification (`READY=1`)
//! - Stopping notification (`STOPPING=1`)
//! - Status updates (`STATUS=...`, shown in `systemctl status`)
//!
//! Every announcement is fire-and-forget. When `NOTIFY_SOCKET` is unset
//! the notifier does nothing.

use std::fmt;
use std::io;
use tracing::{debug, warn};

/// A single notification state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyState {
    /// Startup finished
    Ready,
    /// Shutdown has begun
    Stopping,
    /// Free-form human readable status
    Status(String),
}

impl fmt::Display for NotifyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Status(msg) => write!(f, "STATUS={}", msg),
        }
    }
}

/// Sink for status announcements to the supervising service manager
pub trait StatusNotifier: Send + Sync {
    /// Send one state, reporting transport failures
    fn notify(&self, state: NotifyState) -> io::Result<()>;

    /// Send one state, logging and discarding any failure
    fn announce(&self, state: NotifyState) {
        let line = state.to_string();
        if let Err(e) = self.notify(state) {
            warn!(state = %line, error = %e, "Failed to send service notification");
        }
    }

    fn ready(&self) {
        self.announce(NotifyState::Ready);
    }

    fn stopping(&self) {
        self.announce(NotifyState::Stopping);
    }

    fn status(&self, msg: &str) {
        self.announce(NotifyState::Status(msg.to_string()));
    }
}

/// `sd_notify` over the `NOTIFY_SOCKET` datagram socket
#[derive(Debug, Clone, Default)]
pub struct SystemdNotifier {
    managed: bool,
}

impl SystemdNotifier {
    /// Notifier for the service manager named in `$NOTIFY_SOCKET`
    pub fn from_env() -> Self {
        Self {
            managed: std::env::var_os("NOTIFY_SOCKET").is_some_and(|s| !s.is_empty()),
        }
    }

    /// Whether a notification socket is configured
    pub fn is_systemd_managed(&self) -> bool {
        self.managed
    }
}

impl StatusNotifier for SystemdNotifier {
    fn notify(&self, state: NotifyState) -> io::Result<()> {
        if !self.managed {
            debug!(state = %state, "Not running under a service manager, skipping notification");
            return Ok(());
        }

        debug!(state = %state, "Notifying service manager");
        match &state {
            NotifyState::Ready => sd_notify::notify(false, &[sd_notify::NotifyState::Ready]),
            NotifyState::Stopping => sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]),
            NotifyState::Status(msg) => {
                sd_notify::notify(false, &[sd_notify::NotifyState::Status(msg)])
            }
        }
    }
}
