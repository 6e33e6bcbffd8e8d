//! roku-sync CLI
//!
//! Discovers a Roku and merges it into the Homebridge config, or prints
//! the result for inspection.

use anyhow::Context;
use clap::Parser;
use roku_sync::discovery::ecp::SsdpDeviceProvider;
use roku_sync::discovery::build_descriptor_fragment;
use roku_sync::merge::{
    merge_documents, merge_into_config_at, merge_into_persisted_config, persisted_config_path,
    to_pretty_json,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};

/// Discover a Roku device and merge it into the Homebridge config
#[derive(Parser)]
#[command(name = "roku-sync")]
#[command(about = "Discover a Roku device and merge it into the Homebridge config")]
struct Cli {
    /// Print the result to stdout instead of writing the config file
    #[arg(long)]
    print: bool,

    /// With --print, show the discovered fragment without merging
    #[arg(long, requires = "print")]
    no_merge: bool,

    /// Merge into this file instead of ~/.homebridge/config.json
    #[arg(long)]
    config: Option<PathBuf>,

    /// SSDP search window in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    roku_sync::logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let provider = SsdpDeviceProvider::with_search_window(Duration::from_secs(cli.timeout));
    info!("searching for a Roku device");
    let fragment = build_descriptor_fragment(&provider)
        .await
        .context("device discovery failed")?;

    if cli.print {
        let output = if cli.no_merge {
            fragment
        } else {
            let path = match cli.config.clone() {
                Some(path) => path,
                None => persisted_config_path().context("no home directory")?,
            };
            merge_documents(path, fragment).context("config merge failed")?
        };
        println!("{}", to_pretty_json(&output)?);
        return Ok(());
    }

    match cli.config {
        Some(path) => {
            merge_into_config_at(&path, fragment)
                .with_context(|| format!("failed to merge into {}", path.display()))?;
            info!("merged Roku config into {}", path.display());
        }
        None => {
            // The persisted-config merge never aborts the process; the
            // operator is told and can fix the file and re-run.
            match merge_into_persisted_config(fragment) {
                Ok(()) => info!("merged Roku config into ~/.homebridge/config.json"),
                Err(e) => error!("there was a problem merging the config: {e}"),
            }
        }
    }
    Ok(())
}
