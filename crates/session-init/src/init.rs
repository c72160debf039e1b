//! Init system backends and the session shutdown trigger.
//!
//! Every action here is fire-and-forget: a unit start only enqueues a job
//! on the manager, and legacy commands are spawned without waiting for them.

use crate::{InitError, SystemdBus};
use async_trait::async_trait;
use session_core::{CtlConfig, InitBackend};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Something that can start and stop session units and bring the session down
#[async_trait]
pub trait InitSystem: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Start a named unit
    async fn start_unit(&self, unit: &str) -> Result<(), InitError>;

    /// Stop a named unit
    async fn stop_unit(&self, unit: &str) -> Result<(), InitError>;

    /// Begin full session shutdown
    async fn begin_shutdown(&self) -> Result<(), InitError>;
}

/// Start session shutdown, logging failures. Never retried.
pub async fn trigger_shutdown(init: &dyn InitSystem) {
    info!(backend = init.name(), "Starting session shutdown");

    if let Err(e) = init.begin_shutdown().await {
        warn!(backend = init.name(), error = %e, "Failed to start session shutdown");
    }
}

/// Build the backend selected in the configuration.
///
/// Only the systemd backend needs the session bus.
pub async fn init_system_for(config: &CtlConfig) -> Result<Box<dyn InitSystem>, InitError> {
    let wrapper = LegacyWrapper::new(&config.legacy_wrapper_dir);

    let init: Box<dyn InitSystem> = match config.init_system {
        InitBackend::Systemd => {
            let bus = SystemdBus::session().await?;
            Box::new(SystemdInit::new(
                &bus,
                config.shutdown_unit.clone(),
                config.job_mode.clone(),
            ))
        }
        InitBackend::Sysvinit => Box::new(SysVinit::new(
            wrapper,
            config.legacy_shutdown_script.clone(),
        )),
        InitBackend::Openrc => Box::new(OpenRc::new(wrapper, config.openrc_command.clone())),
    };

    Ok(init)
}

/// Backend selected by configuration, set up on first use.
///
/// Lets a caller hold an init system for the whole process without
/// connecting to the bus before it is actually needed.
pub struct ConfiguredInit {
    config: CtlConfig,
    backend: OnceCell<Box<dyn InitSystem>>,
}

impl ConfiguredInit {
    pub fn new(config: CtlConfig) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
        }
    }

    async fn backend(&self) -> Result<&dyn InitSystem, InitError> {
        let backend = self
            .backend
            .get_or_try_init(|| init_system_for(&self.config))
            .await?;
        Ok(backend.as_ref())
    }
}

#[async_trait]
impl InitSystem for ConfiguredInit {
    fn name(&self) -> &'static str {
        match self.config.init_system {
            InitBackend::Systemd => "systemd",
            InitBackend::Sysvinit => "sysvinit",
            InitBackend::Openrc => "openrc",
        }
    }

    async fn start_unit(&self, unit: &str) -> Result<(), InitError> {
        self.backend().await?.start_unit(unit).await
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), InitError> {
        self.backend().await?.stop_unit(unit).await
    }

    async fn begin_shutdown(&self) -> Result<(), InitError> {
        self.backend().await?.begin_shutdown().await
    }
}

/// Spawn a command without waiting for it
fn spawn_detached(program: &str, args: &[&str]) -> Result<(), InitError> {
    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    let child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|source| InitError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    debug!(command = %command_line, pid = ?child.id(), "Spawned init command");

    Ok(())
}

/// systemd user manager
pub struct SystemdInit {
    bus: SystemdBus,
    shutdown_unit: String,
    job_mode: String,
}

impl SystemdInit {
    pub fn new(bus: &SystemdBus, shutdown_unit: String, job_mode: String) -> Self {
        Self {
            bus: bus.clone(),
            shutdown_unit,
            job_mode,
        }
    }
}

#[async_trait]
impl InitSystem for SystemdInit {
    fn name(&self) -> &'static str {
        "systemd"
    }

    async fn start_unit(&self, unit: &str) -> Result<(), InitError> {
        let job = self.bus.manager().start_unit(unit, &self.job_mode).await?;
        debug!(unit, job = %job.as_str(), "Queued start job");
        Ok(())
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), InitError> {
        let job = self.bus.manager().stop_unit(unit, &self.job_mode).await?;
        debug!(unit, job = %job.as_str(), "Queued stop job");
        Ok(())
    }

    async fn begin_shutdown(&self) -> Result<(), InitError> {
        self.start_unit(&self.shutdown_unit).await
    }
}

/// Per-unit shell wrappers, run as `<dir>/<unit> <action>`.
///
/// A wrapper may ignore the action and simply start its plugin.
#[derive(Debug, Clone)]
pub struct LegacyWrapper {
    dir: PathBuf,
}

impl LegacyWrapper {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Shell command line for a unit action
    pub fn command_line(&self, unit: &str, action: &str) -> String {
        format!("{} {}", self.dir.join(unit).display(), action)
    }

    /// Run a unit action through `/bin/sh -c`
    pub fn run(&self, unit: &str, action: &str) -> Result<(), InitError> {
        let command = self.command_line(unit, action);
        spawn_detached("/bin/sh", &["-c", &command]).inspect_err(|e| {
            warn!(unit, action, error = %e, "Failed to run unit {} {}", unit, action);
        })
    }

    pub fn start(&self, unit: &str) -> Result<(), InitError> {
        self.run(unit, "start")
    }

    pub fn stop(&self, unit: &str) -> Result<(), InitError> {
        self.run(unit, "stop")
    }
}

/// SysVinit: wrappers plus a dedicated shutdown script
pub struct SysVinit {
    wrapper: LegacyWrapper,
    shutdown_script: PathBuf,
}

impl SysVinit {
    pub fn new(wrapper: LegacyWrapper, shutdown_script: PathBuf) -> Self {
        Self {
            wrapper,
            shutdown_script,
        }
    }
}

#[async_trait]
impl InitSystem for SysVinit {
    fn name(&self) -> &'static str {
        "sysvinit"
    }

    async fn start_unit(&self, unit: &str) -> Result<(), InitError> {
        self.wrapper.start(unit)
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), InitError> {
        self.wrapper.stop(unit)
    }

    async fn begin_shutdown(&self) -> Result<(), InitError> {
        let script = self.shutdown_script.display().to_string();
        spawn_detached(&script, &["start"])
    }
}

/// OpenRC: wrappers plus a runlevel switch for shutdown
pub struct OpenRc {
    wrapper: LegacyWrapper,
    runlevel_command: Vec<String>,
}

impl OpenRc {
    pub fn new(wrapper: LegacyWrapper, runlevel_command: Vec<String>) -> Self {
        Self {
            wrapper,
            runlevel_command,
        }
    }
}

#[async_trait]
impl InitSystem for OpenRc {
    fn name(&self) -> &'static str {
        "openrc"
    }

    async fn start_unit(&self, unit: &str) -> Result<(), InitError> {
        self.wrapper.start(unit)
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), InitError> {
        self.wrapper.stop(unit)
    }

    async fn begin_shutdown(&self) -> Result<(), InitError> {
        let (program, args) = self
            .runlevel_command
            .split_first()
            .ok_or_else(|| InitError::InvalidCommand("empty OpenRC command".to_string()))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        spawn_detached(program, &args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_command_line() {
        let wrapper = LegacyWrapper::new("/etc/xdg/gnome");
        assert_eq!(
            wrapper.command_line("gsd-power", "start"),
            "/etc/xdg/gnome/gsd-power start"
        );
        assert_eq!(
            wrapper.command_line("gsd-power", "stop"),
            "/etc/xdg/gnome/gsd-power stop"
        );
    }

    #[tokio::test]
    async fn test_openrc_rejects_empty_command() {
        let init = OpenRc::new(LegacyWrapper::new("/etc/xdg/gnome"), Vec::new());
        let err = init.begin_shutdown().await.unwrap_err();
        assert!(matches!(err, InitError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn test_sysvinit_missing_script_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let init = SysVinit::new(
            LegacyWrapper::new(dir.path()),
            dir.path().join("missing-shutdown"),
        );
        let err = init.begin_shutdown().await.unwrap_err();
        assert!(matches!(err, InitError::Spawn { .. }));

        // trigger_shutdown only logs
        trigger_shutdown(&init).await;
    }
}
