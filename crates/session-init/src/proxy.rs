//! D-Bus proxies for the systemd user manager and the GNOME session manager.

use zbus::proxy;
use zbus::zvariant::OwnedObjectPath;

/// Well-known name of the systemd manager
pub const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";

/// Interface carrying `ActiveState` on unit objects
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
pub trait Manager {
    /// Object path of a loaded unit
    fn get_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    /// Enqueue a start job, returning the job path
    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    /// Enqueue a stop job, returning the job path
    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Unit",
    default_service = "org.freedesktop.systemd1"
)]
pub trait Unit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.gnome.SessionManager",
    default_service = "org.gnome.SessionManager",
    default_path = "/org/gnome/SessionManager"
)]
pub trait SessionManager {
    /// Tell the session manager that session initialization is done
    #[zbus(no_autostart)]
    fn initialized(&self) -> zbus::Result<()>;
}
