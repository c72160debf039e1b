//! Unit `ActiveState` values.

use std::fmt;

/// High-level state of a systemd unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    Active,
    Reloading,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Maintenance,
    Refreshing,
    /// A value this build does not know about, kept verbatim
    Other(String),
}

impl ActiveState {
    /// Whether the unit has fully stopped
    pub fn is_inactive(&self) -> bool {
        matches!(self, ActiveState::Inactive)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActiveState::Active => "active",
            ActiveState::Reloading => "reloading",
            ActiveState::Inactive => "inactive",
            ActiveState::Failed => "failed",
            ActiveState::Activating => "activating",
            ActiveState::Deactivating => "deactivating",
            ActiveState::Maintenance => "maintenance",
            ActiveState::Refreshing => "refreshing",
            ActiveState::Other(value) => value,
        }
    }
}

impl From<&str> for ActiveState {
    fn from(value: &str) -> Self {
        match value {
            "active" => ActiveState::Active,
            "reloading" => ActiveState::Reloading,
            "inactive" => ActiveState::Inactive,
            "failed" => ActiveState::Failed,
            "activating" => ActiveState::Activating,
            "deactivating" => ActiveState::Deactivating,
            "maintenance" => ActiveState::Maintenance,
            "refreshing" => ActiveState::Refreshing,
            other => ActiveState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_states() {
        assert_eq!(ActiveState::from("inactive"), ActiveState::Inactive);
        assert_eq!(ActiveState::from("deactivating"), ActiveState::Deactivating);
        assert_eq!(ActiveState::from("activating"), ActiveState::Activating);
        assert!(ActiveState::from("inactive").is_inactive());
        assert!(!ActiveState::from("failed").is_inactive());
    }

    #[test]
    fn test_unknown_state_preserved() {
        let state = ActiveState::from("hibernating");
        assert_eq!(state, ActiveState::Other("hibernating".to_string()));
        assert_eq!(state.to_string(), "hibernating");
        assert!(!state.is_inactive());
    }
}
