//! gnome-session-leader
//!
//! Session leader for the greeter session on non-systemd login paths.

use anyhow::{Context, Result};
use clap::Parser;
use session_core::{CtlConfig, SessionEnvironment};
use session_init::SystemdBus;
use session_leader::{termination_channel, Leader};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gnome-session-leader")]
#[command(about = "Session leader that coordinates session shutdown")]
#[command(version)]
struct Cli {
    /// Name of the session being led
    session_name: String,

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

async fn run(config: CtlConfig) -> Result<()> {
    let bus = SystemdBus::session()
        .await
        .context("Failed to obtain session bus")?;

    // Raced against the FIFO open, which blocks until the monitor shows up
    let mut signals = termination_channel().context("Failed to install signal handlers")?;

    let fifo_path = config.fifo_path().context("Failed to locate leader FIFO")?;
    let Some(leader) =
        Leader::open_or_signal(bus, &fifo_path, &config.watched_unit, &mut signals)
            .await
            .context("Failed to watch session")?
    else {
        return Ok(());
    };

    let exit = leader.run(signals).await;
    info!(?exit, "Session leader finished");

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

    info!(session = %cli.session_name, "Starting gnome-session-leader v{}", env!("CARGO_PKG_VERSION"));

    // Environment changes happen before any runtime thread exists
    let env = SessionEnvironment::from_env();
    env.apply();
    if let Some(session_type) = &env.session_type {
        debug!(session_type = %session_type, "Session type");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config));

    // An abandoned FIFO open may still be parked on the blocking pool
    runtime.shutdown_background();
    result
}
