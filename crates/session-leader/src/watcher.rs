//! Waits for the pre-shutdown unit to become inactive.
//!
//! Started once the monitor has hung up on the FIFO. The watcher moves
//! through `Idle -> AwaitingIdentity -> AwaitingInitialState -> Subscribed
//! -> Done`, and every failure on the way fails open to `Done`: the leader
//! must never hang on an unreachable service manager.

use session_init::{ActiveState, PropertyStream, UnitBus, UnitPath, UnitPropertiesChanged};
use tracing::{debug, warn};

/// Where the watcher is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    /// Not started
    Idle,
    /// Resolving the unit name
    AwaitingIdentity,
    /// Unit resolved, fetching its current state
    AwaitingInitialState { unit: UnitPath },
    /// Waiting for `ActiveState` to become inactive
    Subscribed {
        unit: UnitPath,
        last_state: Option<ActiveState>,
    },
    /// Finished; further notifications are ignored
    Done,
}

/// Result of starting the watcher
pub enum WatchOutcome {
    /// Unit already inactive; nothing to wait for
    AlreadyInactive,
    /// Waiting on this notification stream
    Subscribed(PropertyStream),
    /// Unit could not be resolved or observed
    Failed,
    /// `start` was called more than once
    AlreadyStarted,
}

/// Unit state watcher
pub struct UnitWatcher {
    unit_name: String,
    state: WatchState,
}

impl UnitWatcher {
    pub fn new(unit_name: impl Into<String>) -> Self {
        Self {
            unit_name: unit_name.into(),
            state: WatchState::Idle,
        }
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == WatchState::Done
    }

    /// Resolve the unit, subscribe, and check whether it already stopped.
    ///
    /// The subscription is registered before the state is read, so a
    /// transition landing between the two is still delivered. On the
    /// already-inactive path that subscription is dropped again before
    /// returning: the fast and slow paths never both hand out a stream,
    /// but the fast path does briefly hold one.
    pub async fn start<B: UnitBus + ?Sized>(&mut self, bus: &B) -> WatchOutcome {
        if self.state != WatchState::Idle {
            return WatchOutcome::AlreadyStarted;
        }

        self.state = WatchState::AwaitingIdentity;
        let unit = match bus.get_unit(&self.unit_name).await {
            Ok(unit) => unit,
            Err(e) => {
                warn!(unit = %self.unit_name, error = %e, "Could not get unit for {}", self.unit_name);
                self.state = WatchState::Done;
                return WatchOutcome::Failed;
            }
        };

        self.state = WatchState::AwaitingInitialState { unit: unit.clone() };
        let stream = match bus.subscribe(&unit).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(unit = %self.unit_name, error = %e, "Could not watch {} unit", self.unit_name);
                self.state = WatchState::Done;
                return WatchOutcome::Failed;
            }
        };

        let last_state = match bus.active_state(&unit).await {
            Ok(state) if state.is_inactive() => {
                debug!(unit = %self.unit_name, "State of {} unit already inactive, quitting", self.unit_name);
                self.state = WatchState::Done;
                return WatchOutcome::AlreadyInactive;
            }
            Ok(state) => {
                debug!(
                    unit = %self.unit_name,
                    state = %state,
                    "State of {} unit is '{}', waiting for it to go inactive",
                    self.unit_name,
                    state
                );
                Some(state)
            }
            Err(e) => {
                debug!(
                    unit = %self.unit_name,
                    error = %e,
                    "State of {} unit is unknown, waiting for it to go inactive",
                    self.unit_name
                );
                None
            }
        };

        self.state = WatchState::Subscribed { unit, last_state };
        WatchOutcome::Subscribed(stream)
    }

    /// Feed one property notification. Returns true when the unit has
    /// become inactive.
    pub fn on_properties_changed(&mut self, change: &UnitPropertiesChanged) -> bool {
        let WatchState::Subscribed { last_state, .. } = &mut self.state else {
            return false;
        };

        let Some(state) = change.active_state() else {
            return false;
        };

        if state.is_inactive() {
            debug!(unit = %self.unit_name, "Session services now inactive, quitting");
            self.state = WatchState::Done;
            return true;
        }

        debug!(unit = %self.unit_name, state = %state, "Unit state changed");
        *last_state = Some(state);
        false
    }

    /// Give up after the notification stream ended
    pub fn abandon(&mut self) {
        self.state = WatchState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use session_init::{InitError, PropertyChange};
    use std::sync::Mutex;

    const UNIT: &str = "graphical-session-pre.target";
    const UNIT_PATH: &str = "/org/freedesktop/systemd1/unit/graphical_2dsession_2dpre_2etarget";

    struct MockBus {
        known: bool,
        subscribable: bool,
        state: Option<ActiveState>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockBus {
        fn with_state(state: ActiveState) -> Self {
            Self {
                known: true,
                subscribable: true,
                state: Some(state),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn bus_error(message: &str) -> InitError {
        InitError::Bus(zbus::Error::Failure(message.to_string()))
    }

    #[async_trait]
    impl UnitBus for MockBus {
        async fn get_unit(&self, name: &str) -> Result<UnitPath, InitError> {
            self.calls.lock().unwrap().push("get_unit");
            if self.known && name == UNIT {
                Ok(UnitPath::new(UNIT_PATH))
            } else {
                Err(bus_error("Unit not loaded"))
            }
        }

        async fn subscribe(&self, _unit: &UnitPath) -> Result<PropertyStream, InitError> {
            self.calls.lock().unwrap().push("subscribe");
            if self.subscribable {
                Ok(stream::pending().boxed())
            } else {
                Err(bus_error("Match rule rejected"))
            }
        }

        async fn active_state(&self, _unit: &UnitPath) -> Result<ActiveState, InitError> {
            self.calls.lock().unwrap().push("active_state");
            self.state.clone().ok_or_else(|| bus_error("No reply"))
        }
    }

    fn state_change(value: &str) -> UnitPropertiesChanged {
        UnitPropertiesChanged::unit(vec![PropertyChange::new("ActiveState", value)])
    }

    #[tokio::test]
    async fn test_already_inactive_finishes_immediately() {
        let bus = MockBus::with_state(ActiveState::Inactive);
        let mut watcher = UnitWatcher::new(UNIT);

        let outcome = watcher.start(&bus).await;

        assert!(matches!(outcome, WatchOutcome::AlreadyInactive));
        assert!(watcher.is_done());
        assert_eq!(bus.calls(), vec!["get_unit", "subscribe", "active_state"]);
    }

    #[tokio::test]
    async fn test_waits_for_inactive_notification() {
        let bus = MockBus::with_state(ActiveState::Active);
        let mut watcher = UnitWatcher::new(UNIT);

        let outcome = watcher.start(&bus).await;
        assert!(matches!(outcome, WatchOutcome::Subscribed(_)));
        assert_eq!(
            watcher.state(),
            &WatchState::Subscribed {
                unit: UnitPath::new(UNIT_PATH),
                last_state: Some(ActiveState::Active),
            }
        );

        let unrelated = UnitPropertiesChanged::unit(vec![PropertyChange::new("SubState", "stop")]);
        assert!(!watcher.on_properties_changed(&unrelated));

        assert!(!watcher.on_properties_changed(&state_change("deactivating")));
        assert_eq!(
            watcher.state(),
            &WatchState::Subscribed {
                unit: UnitPath::new(UNIT_PATH),
                last_state: Some(ActiveState::Deactivating),
            }
        );

        assert!(watcher.on_properties_changed(&state_change("inactive")));
        assert!(watcher.is_done());
    }

    #[tokio::test]
    async fn test_notifications_after_done_ignored() {
        let bus = MockBus::with_state(ActiveState::Active);
        let mut watcher = UnitWatcher::new(UNIT);
        let _ = watcher.start(&bus).await;

        assert!(watcher.on_properties_changed(&state_change("inactive")));
        assert!(!watcher.on_properties_changed(&state_change("inactive")));
        assert!(watcher.is_done());
    }

    #[test]
    fn test_notifications_before_start_ignored() {
        let mut watcher = UnitWatcher::new(UNIT);
        assert!(!watcher.on_properties_changed(&state_change("inactive")));
        assert_eq!(watcher.state(), &WatchState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_unit_fails_open() {
        let bus = MockBus {
            known: false,
            ..MockBus::with_state(ActiveState::Active)
        };
        let mut watcher = UnitWatcher::new(UNIT);

        let outcome = watcher.start(&bus).await;

        assert!(matches!(outcome, WatchOutcome::Failed));
        assert!(watcher.is_done());
        assert_eq!(bus.calls(), vec!["get_unit"]);
    }

    #[tokio::test]
    async fn test_subscribe_failure_fails_open() {
        let bus = MockBus {
            subscribable: false,
            ..MockBus::with_state(ActiveState::Active)
        };
        let mut watcher = UnitWatcher::new(UNIT);

        let outcome = watcher.start(&bus).await;

        assert!(matches!(outcome, WatchOutcome::Failed));
        assert!(watcher.is_done());
        assert_eq!(bus.calls(), vec!["get_unit", "subscribe"]);
    }

    #[tokio::test]
    async fn test_unreadable_state_keeps_waiting() {
        let bus = MockBus {
            state: None,
            ..MockBus::with_state(ActiveState::Active)
        };
        let mut watcher = UnitWatcher::new(UNIT);

        let outcome = watcher.start(&bus).await;

        assert!(matches!(outcome, WatchOutcome::Subscribed(_)));
        assert_eq!(
            watcher.state(),
            &WatchState::Subscribed {
                unit: UnitPath::new(UNIT_PATH),
                last_state: None,
            }
        );
    }

    #[tokio::test]
    async fn test_start_only_once() {
        let bus = MockBus::with_state(ActiveState::Active);
        let mut watcher = UnitWatcher::new(UNIT);

        let _ = watcher.start(&bus).await;
        let outcome = watcher.start(&bus).await;

        assert!(matches!(outcome, WatchOutcome::AlreadyStarted));
        assert_eq!(bus.calls().len(), 3);
    }
}
