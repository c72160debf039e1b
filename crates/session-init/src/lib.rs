//! Service manager and init system access
//!
//! This crate wraps everything the session processes need from the
//! outside world apart from the FIFO: unit lookups and property
//! notifications on the systemd user manager, the shutdown trigger for
//! systemd and legacy init systems, and the session manager's
//! initialization call.

mod bus;
mod error;
mod init;
mod proxy;
mod session;
mod state;

pub use bus::{PropertyChange, PropertyStream, SystemdBus, UnitBus, UnitPath, UnitPropertiesChanged};
pub use error::InitError;
pub use init::{
    init_system_for, trigger_shutdown, ConfiguredInit, InitSystem, LegacyWrapper, OpenRc, SysVinit,
    SystemdInit,
};
pub use proxy::{ManagerProxy, SessionManagerProxy, UnitProxy, UNIT_INTERFACE};
pub use session::signal_initialized;
pub use state::ActiveState;
