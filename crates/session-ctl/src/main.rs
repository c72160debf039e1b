//! gnome-session-ctl
//!
//! Monitors the session leader and drives session shutdown through the
//! configured init system.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use session_core::{CtlConfig, StatusNotifier, SystemdNotifier};
use session_ctl::{monitor_session, wait_for_stop};
use session_init::{trigger_shutdown, ConfiguredInit, InitSystem};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gnome-session-ctl")]
#[command(about = "Small utility program to manage the GNOME session leader")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["shutdown", "monitor", "signal_init", "start_unit", "stop_unit"]),
))]
struct Cli {
    /// Start gnome-session-shutdown service
    #[arg(long)]
    shutdown: bool,

    /// Monitor leader FIFO for session shutdown
    #[arg(long)]
    monitor: bool,

    /// Signal initialization done to gnome-session
    #[arg(long)]
    signal_init: bool,

    /// Start a session unit
    #[arg(long, value_name = "UNIT")]
    start_unit: Option<String>,

    /// Stop a session unit
    #[arg(long, value_name = "UNIT")]
    stop_unit: Option<String>,

    /// Configuration file (default: ~/.config/gnome-session/session-ctl.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<CtlConfig> {
    match path {
        Some(path) => CtlConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(CtlConfig::load().unwrap_or_else(|e| {
            eprintln!("Ignoring configuration: {}", e);
            CtlConfig::default()
        })),
    }
}

async fn cmd_monitor(config: &CtlConfig, init: &dyn InitSystem) -> Result<()> {
    // Raced against the FIFO open, which blocks until the leader shows up
    let stop = wait_for_stop().context("Failed to install signal handlers")?;

    let fifo_path = config.fifo_path().context("Failed to locate leader FIFO")?;
    monitor_session(&fifo_path, SystemdNotifier::from_env(), stop, init)
        .await
        .context("Cannot monitor leader")?;

    Ok(())
}

async fn cmd_signal_init() {
    let conn = match zbus::Connection::session().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "Couldn't connect to session bus");
            return;
        }
    };

    if let Err(e) = session_init::signal_initialized(&conn).await {
        warn!(error = %e, "Failed to call signal initialization");
    }
}

async fn cmd_unit(init: &dyn InitSystem, unit: &str, start: bool) {
    let result = if start {
        init.start_unit(unit).await
    } else {
        init.stop_unit(unit).await
    };

    if let Err(e) = result {
        let action = if start { "start" } else { "stop" };
        warn!(unit, error = %e, "Failed to {} unit {}", action, unit);
    }
}

async fn run(cli: Cli, config: CtlConfig) -> Result<()> {
    let notifier = SystemdNotifier::from_env();
    notifier.ready();

    let init = ConfiguredInit::new(config.clone());

    if cli.signal_init {
        cmd_signal_init().await;
    } else if cli.shutdown {
        trigger_shutdown(&init).await;
    } else if cli.monitor {
        cmd_monitor(&config, &init).await?;
    } else if let Some(unit) = &cli.start_unit {
        cmd_unit(&init, unit, true).await;
    } else if let Some(unit) = &cli.stop_unit {
        cmd_unit(&init, unit, false).await;
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    info!(backend = ?config.init_system, "Starting gnome-session-ctl v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli, config));

    // An abandoned FIFO open may still be parked on the blocking pool
    runtime.shutdown_background();
    result
}
