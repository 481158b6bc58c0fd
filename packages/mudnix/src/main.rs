use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

use mudnix_session::{Console, GameApi};

mod cli;
mod config;

use crate::cli::terminal::TerminalConsole;
use crate::config::MudnixConfig;

#[derive(Parser)]
#[command(name = "mudnix")]
#[command(about = "Terminal client for the Mudnix multiplayer text game")]
#[command(version)]
struct Cli {
    /// Game server URL (overrides server.base_url)
    #[arg(long)]
    base_url: Option<String>,

    /// Custom data directory (defaults to ~/.mudnix)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(cli));
    // A prompt still blocked on stdin must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = MudnixConfig::new(cli.data_dir)?;
    let mut file_config = config.load()?;
    if let Some(base_url) = cli.base_url {
        file_config.server.base_url = base_url;
    }

    init_logging(&config, cli.debug)?;
    info!(data_dir = %config.data_dir.display(), "configuration loaded");

    let api = GameApi::new(
        file_config.server.base_url.clone(),
        file_config.client.request_timeout(),
    );
    let console: Arc<dyn Console> = Arc::new(TerminalConsole::new());
    cli::run(api, console, file_config.client.teardown_grace()).await
}

/// Log to `<data_dir>/logs/client.log` so tracing output never lands in the
/// middle of the player's prompt.
fn init_logging(config: &MudnixConfig, debug: bool) -> Result<()> {
    let default_directive = if debug {
        "mudnix=debug,mudnix_session=debug,info"
    } else {
        "mudnix=info,mudnix_session=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let log_path = config.log_path();
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(env_filter)
        .init();
    Ok(())
}
