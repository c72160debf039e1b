//! Session leader event loop.
//!
//! The leader owns the FIFO write end. A termination signal turns into a
//! single sentinel byte for the monitor. When the monitor closes its end
//! (it has started the shutdown target and exited), the leader waits for
//! the pre-shutdown unit to go inactive and then returns.

use futures::StreamExt;
use session_init::{PropertyStream, UnitBus, UnitPropertiesChanged};
use session_ipc::{FifoError, FifoWriter};
use std::ops::ControlFlow;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::signals::TerminationSignal;
use crate::watcher::{UnitWatcher, WatchOutcome};

/// Events delivered to the leader's handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderEvent {
    /// A termination signal arrived
    Terminate(TerminationSignal),
    /// The monitor closed the read end of the FIFO
    MonitorHangup,
    /// Property notification for the watched unit
    UnitPropertiesChanged(UnitPropertiesChanged),
    /// The unit notification stream ended
    SubscriptionClosed,
    /// No more signals will be delivered
    SignalsClosed,
}

/// Why the leader's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderExit {
    /// The watched unit became inactive
    UnitInactive,
    /// The watched unit was already inactive when the monitor hung up
    UnitAlreadyInactive,
    /// The watched unit could not be resolved or observed
    UnitUnavailable,
    /// The sentinel byte could not be written
    SignalWriteFailed,
    /// Nothing left that could wake the leader
    Idle,
}

/// Leader context: bus, FIFO and the unit watch
pub struct Leader<B: UnitBus> {
    bus: B,
    fifo: FifoWriter,
    watcher: UnitWatcher,
    subscription: Option<PropertyStream>,
    terminate_sent: bool,
    hangup_seen: bool,
    signals_closed: bool,
}

impl<B: UnitBus> Leader<B> {
    /// Create the FIFO if needed and open its write end.
    ///
    /// Blocks (on the blocking pool) until the monitor opens the read end.
    pub async fn open(bus: B, fifo_path: &Path, watched_unit: &str) -> Result<Self, FifoError> {
        if let Err(e) = session_ipc::create(fifo_path) {
            warn!(error = %e, "Failed to create leader FIFO");
        }

        let fifo = FifoWriter::open(fifo_path).await?;

        info!(fifo = %fifo_path.display(), unit = watched_unit, "Watching session");

        Ok(Self::new(bus, fifo, watched_unit))
    }

    /// Open the FIFO unless a termination signal arrives first.
    ///
    /// Returns `None` when the session ended before a monitor showed up;
    /// there is then nobody to notify. The abandoned open stays parked on
    /// the blocking pool.
    pub async fn open_or_signal(
        bus: B,
        fifo_path: &Path,
        watched_unit: &str,
        signals: &mut mpsc::Receiver<TerminationSignal>,
    ) -> Result<Option<Self>, FifoError> {
        tokio::select! {
            leader = Self::open(bus, fifo_path, watched_unit) => leader.map(Some),
            Some(sig) = signals.recv() => {
                info!(signal = %sig, "Session ended before the monitor opened the FIFO");
                Ok(None)
            }
        }
    }

    /// Assemble a leader around an already open FIFO
    pub fn new(bus: B, fifo: FifoWriter, watched_unit: &str) -> Self {
        Self {
            bus,
            fifo,
            watcher: UnitWatcher::new(watched_unit),
            subscription: None,
            terminate_sent: false,
            hangup_seen: false,
            signals_closed: false,
        }
    }

    /// Run until one of the exit conditions is reached
    pub async fn run(mut self, mut signals: mpsc::Receiver<TerminationSignal>) -> LeaderExit {
        loop {
            let event = match self.next_event(&mut signals).await {
                Some(event) => event,
                None => {
                    warn!("Nothing left to wait for, quitting");
                    return LeaderExit::Idle;
                }
            };

            if let ControlFlow::Break(exit) = self.dispatch(event).await {
                debug!(?exit, "Leader run finished");
                return exit;
            }
        }
    }

    async fn next_event(
        &mut self,
        signals: &mut mpsc::Receiver<TerminationSignal>,
    ) -> Option<LeaderEvent> {
        let fifo = &self.fifo;
        let subscription = &mut self.subscription;

        tokio::select! {
            sig = signals.recv(), if !self.signals_closed => Some(match sig {
                Some(sig) => LeaderEvent::Terminate(sig),
                None => LeaderEvent::SignalsClosed,
            }),
            result = fifo.hangup(), if !self.hangup_seen => {
                if let Err(e) = result {
                    warn!(error = %e, "Error watching leader FIFO, treating as hang-up");
                }
                Some(LeaderEvent::MonitorHangup)
            }
            change = next_change(subscription), if subscription.is_some() => Some(match change {
                Some(change) => LeaderEvent::UnitPropertiesChanged(change),
                None => LeaderEvent::SubscriptionClosed,
            }),
            else => None,
        }
    }

    /// Handle one event
    pub async fn dispatch(&mut self, event: LeaderEvent) -> ControlFlow<LeaderExit> {
        match event {
            LeaderEvent::Terminate(sig) => self.on_terminate(sig),
            LeaderEvent::MonitorHangup => self.on_monitor_hangup().await,
            LeaderEvent::UnitPropertiesChanged(change) => {
                if self.watcher.on_properties_changed(&change) {
                    self.subscription = None;
                    ControlFlow::Break(LeaderExit::UnitInactive)
                } else {
                    ControlFlow::Continue(())
                }
            }
            LeaderEvent::SubscriptionClosed => {
                warn!(unit = self.watcher.unit_name(), "Lost unit property notifications");
                self.subscription = None;
                self.watcher.abandon();
                ControlFlow::Break(LeaderExit::UnitUnavailable)
            }
            LeaderEvent::SignalsClosed => {
                self.signals_closed = true;
                ControlFlow::Continue(())
            }
        }
    }

    fn on_terminate(&mut self, sig: TerminationSignal) -> ControlFlow<LeaderExit> {
        if self.terminate_sent {
            debug!(signal = %sig, "Shutdown already signalled to monitor");
            return ControlFlow::Continue(());
        }
        self.terminate_sent = true;

        debug!(signal = %sig, "Session termination requested");

        match self.fifo.signal_terminate() {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                warn!(error = %e, "Failed to signal shutdown to monitor");
                ControlFlow::Break(LeaderExit::SignalWriteFailed)
            }
        }
    }

    async fn on_monitor_hangup(&mut self) -> ControlFlow<LeaderExit> {
        self.hangup_seen = true;

        debug!("Services have begun stopping, waiting for them to finish stopping");

        match self.watcher.start(&self.bus).await {
            WatchOutcome::AlreadyInactive => ControlFlow::Break(LeaderExit::UnitAlreadyInactive),
            WatchOutcome::Failed => ControlFlow::Break(LeaderExit::UnitUnavailable),
            WatchOutcome::Subscribed(stream) => {
                self.subscription = Some(stream);
                ControlFlow::Continue(())
            }
            WatchOutcome::AlreadyStarted => ControlFlow::Continue(()),
        }
    }
}

async fn next_change(subscription: &mut Option<PropertyStream>) -> Option<UnitPropertiesChanged> {
    match subscription {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
