//! GNOME session manager calls.

use crate::proxy::SessionManagerProxy;
use crate::InitError;
use zbus::Connection;

/// Tell gnome-session that initialization is complete.
///
/// Does not auto-start the session manager.
pub async fn signal_initialized(conn: &Connection) -> Result<(), InitError> {
    let proxy = SessionManagerProxy::new(conn).await?;
    proxy.initialized().await?;

    tracing::debug!("Signalled session initialization");

    Ok(())
}
