use antivirus_updater::catalogue;
use antivirus_updater::cli::Args;
use antivirus_updater::logging::init_logging;
use antivirus_updater::{Config, Pipeline};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.loglevel)?;

    let config = Config::from_args(&args);

    let entries = match &args.catalogue {
        Some(path) => catalogue::load(Path::new(path))?,
        None => catalogue::builtin(),
    };

    if args.list {
        for entry in entries.iter().filter(|e| config.filter.admits(e)) {
            println!(
                "{:<24} {:<32} {}",
                entry.category().unwrap_or("-"),
                entry.name_prefix,
                entry.start_url
            );
        }
        return Ok(());
    }

    info!(
        entries = entries.len(),
        root = %config.downloads_root.display(),
        "Checking for updates"
    );

    let pipeline = Pipeline::new(config).context("Failed to build HTTP client")?;
    pipeline.run(entries).await;

    Ok(())
}
