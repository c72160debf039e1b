//! Session environment normalisation for the leader process.

use std::path::PathBuf;

/// User the greeter session runs as; also the fallback when `USER` is unset
pub const GREETER_USER: &str = "gdm-greeter";

/// Base directory for greeter home directories
const GREETER_HOME_BASE: &str = "/var/lib";

/// Resolved user identity plus the variables that must be rewritten
/// before the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnvironment {
    /// Effective user name
    pub user: String,
    /// Normalised `XDG_SESSION_TYPE`, if one was set
    pub session_type: Option<String>,
    overrides: Vec<(&'static str, String)>,
}

impl SessionEnvironment {
    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup("USER").unwrap_or_else(|| GREETER_USER.to_string());
        let mut overrides = Vec::new();

        if user == GREETER_USER {
            let home_dir = PathBuf::from(GREETER_HOME_BASE).join(&user);
            let config_dir = home_dir.join(".config");
            overrides.push(("XDG_CONFIG_HOME", config_dir.display().to_string()));
            overrides.push(("HOME", home_dir.display().to_string()));
        }

        let session_type = lookup("XDG_SESSION_TYPE").map(|value| {
            let normalised = normalise_session_type(&value);
            if normalised != value {
                overrides.push(("XDG_SESSION_TYPE", normalised.clone()));
            }
            normalised
        });

        Self {
            user,
            session_type,
            overrides,
        }
    }

    /// Whether this is the greeter user
    pub fn is_greeter(&self) -> bool {
        self.user == GREETER_USER
    }

    /// Variables that `apply` will set
    pub fn overrides(&self) -> &[(&'static str, String)] {
        &self.overrides
    }

    /// Export the overrides into the process environment.
    ///
    /// Must run before any other thread is started.
    pub fn apply(&self) {
        tracing::info!(user = %self.user, "User is: {}", self.user);

        if !self.is_greeter() {
            tracing::warn!("The gdm-greeter user wasn't found. Expect stuff to break.");
        }

        for (key, value) in &self.overrides {
            tracing::debug!(key = %key, value = %value, "Setting environment variable");
            std::env::set_var(key, value);
        }
    }
}

/// `tty` sessions are reported as `wayland` to downstream consumers.
fn normalise_session_type(value: &str) -> String {
    match value {
        "tty" => "wayland".to_string(),
        other => other.to_string(),
    }
}
