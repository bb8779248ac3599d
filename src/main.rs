//! keycode-info-replay: drive the key tracker from recorded transitions
//!
//! Reads one JSON key transition (or `read`) per line from stdin and writes
//! measure snapshots and fired release actions to stdout. Options come from
//! `KEYCODEINFO_<OPTION>` environment variables, e.g. `KEYCODEINFO_SHOWCODE=4`.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keycode_info::config::{Config, EnvOptions};
use keycode_info::keys::SystemKeyNames;
use keycode_info::lifecycle::ShutdownSignal;
use keycode_info::replay;
use keycode_info::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keycode-info-replay starting");

    let config = Config::from_options(&EnvOptions::new());
    info!(?config, "configuration loaded");

    let mut tracker = Tracker::new(config, Arc::new(SystemKeyNames));
    let shutdown = ShutdownSignal::new();
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = replay::run(&mut tracker, BufReader::new(tokio::io::stdin()), &mut stdout) => {
            let stats = result?;
            info!(?stats, "input exhausted");
        }
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("keycode-info-replay stopped");
    Ok(())
}
