//! Unit lookups and property notifications on the systemd user manager.
//!
//! `UnitBus` is the seam the leader's unit watcher talks through, so the
//! watcher can run against the real session bus or an in-process fake.

use crate::proxy::{ManagerProxy, UnitProxy, SYSTEMD_SERVICE, UNIT_INTERFACE};
use crate::{ActiveState, InitError};
use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use std::fmt;
use tracing::debug;
use zbus::fdo::{PropertiesChanged, PropertiesProxy};
use zbus::zvariant::Value;
use zbus::Connection;

/// Object path of a unit, as returned by `GetUnit`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitPath(String);

impl UnitPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One changed property. Only string values are carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    pub value: Option<String>,
}

impl PropertyChange {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// A `PropertiesChanged` notification for a unit object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPropertiesChanged {
    /// Interface whose properties changed
    pub interface: String,
    /// Changed properties with their new values
    pub changed: Vec<PropertyChange>,
}

impl UnitPropertiesChanged {
    /// Notification for the unit interface
    pub fn unit(changed: Vec<PropertyChange>) -> Self {
        Self {
            interface: UNIT_INTERFACE.to_string(),
            changed,
        }
    }

    /// New `ActiveState`, if this notification carries one.
    ///
    /// Other interfaces and other properties are ignored.
    pub fn active_state(&self) -> Option<ActiveState> {
        if self.interface != UNIT_INTERFACE {
            return None;
        }

        self.changed
            .iter()
            .find(|change| change.name == "ActiveState")
            .and_then(|change| change.value.as_deref())
            .map(ActiveState::from)
    }
}

/// Stream of property notifications for one unit
pub type PropertyStream = BoxStream<'static, UnitPropertiesChanged>;

/// Access to units on the service manager
#[async_trait]
pub trait UnitBus: Send + Sync {
    /// Resolve a unit name to its object path
    async fn get_unit(&self, name: &str) -> Result<UnitPath, InitError>;

    /// Subscribe to property notifications for a unit
    async fn subscribe(&self, unit: &UnitPath) -> Result<PropertyStream, InitError>;

    /// Current `ActiveState` of a unit
    async fn active_state(&self, unit: &UnitPath) -> Result<ActiveState, InitError>;
}

/// `UnitBus` on the systemd user manager
#[derive(Clone)]
pub struct SystemdBus {
    conn: Connection,
    manager: ManagerProxy<'static>,
}

impl SystemdBus {
    /// Connect to the session bus
    pub async fn session() -> Result<Self, InitError> {
        let conn = Connection::session().await.map_err(InitError::Connect)?;
        Self::with_connection(conn).await
    }

    /// Use an existing connection
    pub async fn with_connection(conn: Connection) -> Result<Self, InitError> {
        let manager = ManagerProxy::new(&conn).await?;
        Ok(Self { conn, manager })
    }

    pub fn manager(&self) -> &ManagerProxy<'static> {
        &self.manager
    }
}

fn convert_signal(signal: &PropertiesChanged) -> Option<UnitPropertiesChanged> {
    let args = match signal.args() {
        Ok(args) => args,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed PropertiesChanged signal");
            return None;
        }
    };

    let changed = args
        .changed_properties()
        .iter()
        .map(|(name, value)| PropertyChange {
            name: name.to_string(),
            value: match value {
                Value::Str(s) => Some(s.to_string()),
                _ => None,
            },
        })
        .collect();

    Some(UnitPropertiesChanged {
        interface: args.interface_name().to_string(),
        changed,
    })
}

#[async_trait]
impl UnitBus for SystemdBus {
    async fn get_unit(&self, name: &str) -> Result<UnitPath, InitError> {
        let path = self.manager.get_unit(name).await?;
        Ok(UnitPath::new(path.as_str()))
    }

    async fn subscribe(&self, unit: &UnitPath) -> Result<PropertyStream, InitError> {
        let properties = PropertiesProxy::builder(&self.conn)
            .destination(SYSTEMD_SERVICE)?
            .path(unit.as_str().to_owned())?
            .build()
            .await?;

        let stream = properties.receive_properties_changed().await?;

        debug!(unit = %unit, "Subscribed to unit property changes");

        Ok(stream
            .filter_map(|signal| future::ready(convert_signal(&signal)))
            .boxed())
    }

    async fn active_state(&self, unit: &UnitPath) -> Result<ActiveState, InitError> {
        let proxy = UnitProxy::builder(&self.conn)
            .path(unit.as_str().to_owned())?
            .build()
            .await?;

        let state = proxy.active_state().await?;
        Ok(ActiveState::from(state.as_str()))
    }
}
