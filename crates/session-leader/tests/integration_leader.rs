//! Integration tests for the session leader loop over a real FIFO.
//!
//! The service manager is replaced by an in-process bus whose property
//! notifications are pushed through a channel.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use session_init::{
    ActiveState, InitError, PropertyChange, PropertyStream, UnitBus, UnitPath,
    UnitPropertiesChanged,
};
use session_ipc::{FifoEvent, FifoReader, FifoWriter};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use session_leader::{termination_channel, Leader, LeaderEvent, LeaderExit, TerminationSignal};
use std::ops::ControlFlow;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const UNIT: &str = "graphical-session-pre.target";

struct ChannelBus {
    state: ActiveState,
    changes: Mutex<Option<UnboundedReceiver<UnitPropertiesChanged>>>,
}

impl ChannelBus {
    fn new(state: ActiveState) -> (Self, UnboundedSender<UnitPropertiesChanged>) {
        let (tx, rx) = unbounded();
        let bus = Self {
            state,
            changes: Mutex::new(Some(rx)),
        };
        (bus, tx)
    }
}

#[async_trait]
impl UnitBus for ChannelBus {
    async fn get_unit(&self, name: &str) -> Result<UnitPath, InitError> {
        Ok(UnitPath::new(format!("/org/freedesktop/systemd1/unit/{}", name)))
    }

    async fn subscribe(&self, _unit: &UnitPath) -> Result<PropertyStream, InitError> {
        let rx = self.changes.lock().unwrap().take().expect("subscribed twice");
        Ok(rx.boxed())
    }

    async fn active_state(&self, _unit: &UnitPath) -> Result<ActiveState, InitError> {
        Ok(self.state.clone())
    }
}

async fn open_pair(path: &Path) -> (FifoWriter, FifoReader) {
    session_ipc::create(path).unwrap();
    let (writer, reader) = tokio::join!(FifoWriter::open(path), FifoReader::open(path));
    (writer.unwrap(), reader.unwrap())
}

fn state_change(value: &str) -> UnitPropertiesChanged {
    UnitPropertiesChanged::unit(vec![PropertyChange::new("ActiveState", value)])
}

#[tokio::test]
async fn test_terminate_writes_single_sentinel() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");
    let (writer, reader) = open_pair(&path).await;

    let (bus, _changes) = ChannelBus::new(ActiveState::Inactive);
    let leader = Leader::new(bus, writer, UNIT);

    let (signals_tx, signals_rx) = mpsc::channel(4);
    let handle = tokio::spawn(leader.run(signals_rx));

    signals_tx.send(TerminationSignal::Terminate).await.unwrap();

    let event = timeout(Duration::from_secs(5), reader.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, FifoEvent::Readable);
    assert!(reader.drain_sentinel().unwrap());

    // Later signals are not forwarded
    signals_tx.send(TerminationSignal::Hangup).await.unwrap();
    signals_tx.send(TerminationSignal::Interrupt).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!reader.drain_sentinel().unwrap());

    // Monitor goes away; the unit is already inactive
    drop(reader);
    let exit = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(exit, LeaderExit::UnitAlreadyInactive);
}

#[tokio::test]
async fn test_failed_write_ends_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");
    let (writer, reader) = open_pair(&path).await;
    drop(reader);

    let (bus, _changes) = ChannelBus::new(ActiveState::Active);
    let mut leader = Leader::new(bus, writer, UNIT);

    let flow = leader
        .dispatch(LeaderEvent::Terminate(TerminationSignal::Terminate))
        .await;
    assert_eq!(flow, ControlFlow::Break(LeaderExit::SignalWriteFailed));
}

#[tokio::test]
async fn test_hangup_waits_for_unit_to_stop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");
    let (writer, reader) = open_pair(&path).await;

    let (bus, changes) = ChannelBus::new(ActiveState::Active);
    let leader = Leader::new(bus, writer, UNIT);

    let (_signals_tx, signals_rx) = mpsc::channel(4);
    let handle = tokio::spawn(leader.run(signals_rx));

    drop(reader);

    changes
        .unbounded_send(UnitPropertiesChanged::unit(vec![PropertyChange::new(
            "SubState", "stop",
        )]))
        .unwrap();
    changes.unbounded_send(state_change("deactivating")).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    changes.unbounded_send(state_change("inactive")).unwrap();

    let exit = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(exit, LeaderExit::UnitInactive);
}

#[tokio::test]
async fn test_lost_subscription_ends_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");
    let (writer, reader) = open_pair(&path).await;

    let (bus, changes) = ChannelBus::new(ActiveState::Active);
    let leader = Leader::new(bus, writer, UNIT);

    let (_signals_tx, signals_rx) = mpsc::channel(4);
    let handle = tokio::spawn(leader.run(signals_rx));

    drop(reader);
    drop(changes);

    let exit = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(exit, LeaderExit::UnitUnavailable);
}

#[tokio::test]
async fn test_open_rejects_regular_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");
    std::fs::write(&path, b"").unwrap();

    let (bus, _changes) = ChannelBus::new(ActiveState::Active);
    let result = Leader::open(bus, &path, UNIT).await;

    assert!(matches!(result, Err(session_ipc::FifoError::NotAFifo(_))));
}

#[tokio::test]
async fn test_signal_while_waiting_for_monitor_ends_leader() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gnome-session-leader-fifo");

    let mut signals = termination_channel().unwrap();
    let (bus, _changes) = ChannelBus::new(ActiveState::Active);

    // No monitor ever opens the read end
    let open = Leader::open_or_signal(bus, &path, UNIT, &mut signals);
    let terminate = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        kill(Pid::this(), Signal::SIGTERM).unwrap();
    };

    let (result, ()) = timeout(Duration::from_secs(5), async { tokio::join!(open, terminate) })
        .await
        .expect("leader stayed blocked opening the FIFO");
    assert!(matches!(result, Ok(None)));

    // Release the abandoned open so the runtime can shut down
    let _reader = FifoReader::open(&path).await.unwrap();
}
