//! Session monitor: read end of the leader FIFO.
//!
//! The monitor waits for the leader to ask for shutdown (the sentinel
//! byte) or to die (hang-up). Either way it announces that the session is
//! stopping, and once its run is over the session shutdown is started.

use session_core::StatusNotifier;
use session_init::{trigger_shutdown, InitSystem};
use session_ipc::{FifoError, FifoEvent, FifoReader};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::signals::StopSignal;

/// Status line announced once the FIFO is being watched
pub const WATCHING_STATUS: &str = "Watching session leader";

/// Why a monitor run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The leader wrote the shutdown sentinel
    SentinelReceived,
    /// The leader closed its end of the FIFO
    LeaderHungUp,
    /// Watching the FIFO failed
    FifoFailed,
    /// The monitor itself was asked to stop
    Signal(StopSignal),
}

/// Monitor context: FIFO read end and status notifier
pub struct Monitor<N: StatusNotifier> {
    reader: FifoReader,
    notifier: N,
}

impl<N: StatusNotifier> Monitor<N> {
    /// Create the FIFO if needed and open its read end.
    ///
    /// Waits for the leader to open the write end.
    pub async fn open(fifo_path: &Path, notifier: N) -> Result<Self, FifoError> {
        if let Err(e) = session_ipc::create(fifo_path) {
            warn!(error = %e, "Error creating FIFO");
        }

        let reader = FifoReader::open(fifo_path).await?;
        notifier.status(WATCHING_STATUS);

        info!(fifo = %fifo_path.display(), "Watching session leader");

        Ok(Self::new(reader, notifier))
    }

    pub fn new(reader: FifoReader, notifier: N) -> Self {
        Self { reader, notifier }
    }

    /// Wait for the leader or a stop signal. The FIFO stays open afterwards.
    pub async fn run<F>(&self, stop: F) -> MonitorExit
    where
        F: Future<Output = StopSignal>,
    {
        tokio::select! {
            event = self.reader.next_event() => self.on_fifo_event(event),
            sig = stop => {
                debug!(signal = %sig, "Monitor stopped by signal");
                MonitorExit::Signal(sig)
            }
        }
    }

    fn on_fifo_event(&self, event: Result<FifoEvent, FifoError>) -> MonitorExit {
        self.notifier.stopping();

        match event {
            Ok(FifoEvent::Readable) => {
                match self.reader.drain_sentinel() {
                    Ok(true) => debug!("Leader requested shutdown"),
                    Ok(false) => debug!("Leader FIFO readable without data"),
                    Err(e) => warn!(error = %e, "Failed to read leader FIFO"),
                }
                MonitorExit::SentinelReceived
            }
            Ok(FifoEvent::HangUp) => {
                if let Ok(true) = self.reader.drain_sentinel() {
                    debug!("Discarded sentinel pending at hang-up");
                }
                debug!("Leader closed its end of the FIFO");
                MonitorExit::LeaderHungUp
            }
            Err(e) => {
                warn!(error = %e, "Error watching leader FIFO");
                MonitorExit::FifoFailed
            }
        }
    }

    /// Run, then start session shutdown whatever ended the run.
    ///
    /// The FIFO is closed only after shutdown has been started.
    pub async fn run_then_shutdown<F>(self, stop: F, init: &dyn InitSystem) -> MonitorExit
    where
        F: Future<Output = StopSignal>,
    {
        let exit = self.run(stop).await;
        info!(?exit, "Session leader monitor finished");

        trigger_shutdown(init).await;

        exit
    }
}

/// Open the FIFO, run the monitor and then start session shutdown.
///
/// A stop signal that arrives while the FIFO open still waits for the
/// leader ends the run early; shutdown is started all the same. Only a
/// failed open skips the trigger.
pub async fn monitor_session<N, F>(
    fifo_path: &Path,
    notifier: N,
    stop: F,
    init: &dyn InitSystem,
) -> Result<MonitorExit, FifoError>
where
    N: StatusNotifier,
    F: Future<Output = StopSignal>,
{
    tokio::pin!(stop);

    let monitor = tokio::select! {
        monitor = Monitor::open(fifo_path, notifier) => monitor?,
        sig = &mut stop => {
            info!(signal = %sig, "Stopped before the session leader opened the FIFO");
            trigger_shutdown(init).await;
            return Ok(MonitorExit::Signal(sig));
        }
    };

    Ok(monitor.run_then_shutdown(stop, init).await)
}
