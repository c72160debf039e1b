//! Signal handling for the session monitor.

use std::fmt;
use tokio::signal::unix::{signal, SignalKind};

/// Signal that ended a monitor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Interrupt,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Terminate => write!(f, "SIGTERM"),
            StopSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Wait for SIGTERM or SIGINT.
///
/// Handlers are installed when this is called, not when first polled.
pub fn wait_for_stop() -> std::io::Result<impl std::future::Future<Output = StopSignal>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                StopSignal::Terminate
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
                StopSignal::Interrupt
            }
        }
    })
}
