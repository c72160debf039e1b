//! Configuration for the session leader and session monitor.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the leader FIFO inside the user runtime directory
pub const DEFAULT_FIFO_NAME: &str = "gnome-session-leader-fifo";

/// Init system used to bring the session down once the monitor finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitBackend {
    /// systemd user manager, reached over the session bus
    #[default]
    Systemd,
    /// SysVinit-style wrapper scripts
    Sysvinit,
    /// OpenRC, shut down by switching the user runlevel
    Openrc,
}

/// Leader and monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtlConfig {
    /// Override for the user runtime directory holding the FIFO
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,

    /// FIFO file name inside the runtime directory
    #[serde(default = "default_fifo_name")]
    pub fifo_name: String,

    /// Unit the leader waits on before exiting
    #[serde(default = "default_watched_unit")]
    pub watched_unit: String,

    /// Unit started by the monitor to shut the session down
    #[serde(default = "default_shutdown_unit")]
    pub shutdown_unit: String,

    /// systemd job mode used for StartUnit/StopUnit
    #[serde(default = "default_job_mode")]
    pub job_mode: String,

    /// Init backend used by the shutdown trigger
    #[serde(default)]
    pub init_system: InitBackend,

    /// Directory holding legacy per-unit wrapper scripts
    #[serde(default = "default_legacy_wrapper_dir")]
    pub legacy_wrapper_dir: PathBuf,

    /// SysVinit shutdown script, invoked with `start`
    #[serde(default = "default_legacy_shutdown_script")]
    pub legacy_shutdown_script: PathBuf,

    /// OpenRC command switching to the default runlevel
    #[serde(default = "default_openrc_command")]
    pub openrc_command: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_fifo_name() -> String {
    DEFAULT_FIFO_NAME.to_string()
}

fn default_watched_unit() -> String {
    "graphical-session-pre.target".to_string()
}

fn default_shutdown_unit() -> String {
    "gnome-session-shutdown.target".to_string()
}

fn default_job_mode() -> String {
    "fail".to_string()
}

fn default_legacy_wrapper_dir() -> PathBuf {
    PathBuf::from("/etc/xdg/gnome")
}

fn default_legacy_shutdown_script() -> PathBuf {
    PathBuf::from("/etc/init.d/gnome-session-shutdown")
}

fn default_openrc_command() -> Vec<String> {
    vec![
        "/usr/bin/openrc".to_string(),
        "-U".to_string(),
        "default".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            fifo_name: default_fifo_name(),
            watched_unit: default_watched_unit(),
            shutdown_unit: default_shutdown_unit(),
            job_mode: default_job_mode(),
            init_system: InitBackend::default(),
            legacy_wrapper_dir: default_legacy_wrapper_dir(),
            legacy_shutdown_script: default_legacy_shutdown_script(),
            openrc_command: default_openrc_command(),
            log_level: default_log_level(),
        }
    }
}

impl CtlConfig {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gnome-session").join("session-ctl.yaml"))
    }

    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// reported so the caller can decide whether to continue.
    pub fn load() -> Result<Self, CoreError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve the user runtime directory.
    ///
    /// Order: configured override, `XDG_RUNTIME_DIR`, then the user cache
    /// directory.
    pub fn runtime_dir(&self) -> Result<PathBuf, CoreError> {
        if let Some(dir) = &self.runtime_dir {
            return Ok(dir.clone());
        }

        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .ok_or(CoreError::NoRuntimeDir)
    }

    /// Full path of the leader FIFO
    pub fn fifo_path(&self) -> Result<PathBuf, CoreError> {
        Ok(self.runtime_dir()?.join(&self.fifo_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CtlConfig::default();
        assert_eq!(config.fifo_name, "gnome-session-leader-fifo");
        assert_eq!(config.watched_unit, "graphical-session-pre.target");
        assert_eq!(config.shutdown_unit, "gnome-session-shutdown.target");
        assert_eq!(config.init_system, InitBackend::Systemd);
        assert_eq!(config.openrc_command, ["/usr/bin/openrc", "-U", "default"]);
    }

    #[test]
    fn test_config_serialization() {
        let config = CtlConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CtlConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.fifo_name, parsed.fifo_name);
        assert_eq!(config.init_system, parsed.init_system);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CtlConfig = serde_yaml::from_str("init_system: sysvinit\n").unwrap();
        assert_eq!(config.init_system, InitBackend::Sysvinit);
        assert_eq!(config.job_mode, "fail");
        assert_eq!(
            config.legacy_shutdown_script,
            PathBuf::from("/etc/init.d/gnome-session-shutdown")
        );
    }

    #[test]
    fn test_fifo_path_uses_runtime_override() {
        let config = CtlConfig {
            runtime_dir: Some(PathBuf::from("/run/user/1000")),
            ..Default::default()
        };
        assert_eq!(
            config.fifo_path().unwrap(),
            PathBuf::from("/run/user/1000/gnome-session-leader-fifo")
        );
    }

    #[test]
    fn test_load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-ctl.yaml");
        std::fs::write(&path, "init_system: [not, a, backend]\n").unwrap();

        let err = CtlConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn test_load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-ctl.yaml");
        std::fs::write(
            &path,
            "init_system: openrc\nwatched_unit: test-pre.target\nlog_level: debug\n",
        )
        .unwrap();

        let config = CtlConfig::load_from(&path).unwrap();
        assert_eq!(config.init_system, InitBackend::Openrc);
        assert_eq!(config.watched_unit, "test-pre.target");
        assert_eq!(config.log_level, "debug");
    }
}
