//! Logging init: stderr, level from `--loglevel` unless `RUST_LOG` is set.

use crate::cli::LogLevel;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

pub fn init_logging(level: LogLevel) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}
