//! Termination signal handling for the session leader.
//!
//! SIGHUP, SIGTERM and SIGINT all mean the same thing: the session is
//! ending. They are delivered into the leader's event loop through a
//! channel so the loop can be driven without real signals.

use std::fmt;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;

/// A termination-class signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Hangup,
    Terminate,
    Interrupt,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Hangup => write!(f, "SIGHUP"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Registered signal handlers.
///
/// Registration happens eagerly in `register` so a signal arriving while
/// the leader is still blocked opening the FIFO is queued, not fatal.
pub struct TerminationSignals {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

impl TerminationSignals {
    /// Install handlers for SIGHUP, SIGTERM and SIGINT
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next termination signal
    pub async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            Some(()) = self.hangup.recv() => Some(TerminationSignal::Hangup),
            Some(()) = self.terminate.recv() => Some(TerminationSignal::Terminate),
            Some(()) = self.interrupt.recv() => Some(TerminationSignal::Interrupt),
            else => None,
        }
    }

    /// Forward every signal into a channel until the receiver goes away
    pub async fn forward(mut self, tx: mpsc::Sender<TerminationSignal>) {
        while let Some(sig) = self.recv().await {
            tracing::debug!(signal = %sig, "Session termination requested");
            if tx.send(sig).await.is_err() {
                break;
            }
        }
    }
}

/// Register handlers and return a channel fed by them
pub fn termination_channel() -> std::io::Result<mpsc::Receiver<TerminationSignal>> {
    let signals = TerminationSignals::register()?;
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(signals.forward(tx));
    Ok(rx)
}
