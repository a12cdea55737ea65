use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use haste::config::Config;
use haste::constants::DEFAULT_CONFIG_PATH;
use haste::handler::DocumentHandler;
use haste::logging::init_logging;

/// Short-text snippet storage service
#[derive(Parser)]
#[command(name = "haste")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json)
    config: Option<PathBuf>,

    /// Bind address, overrides the config file and HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config)?;
    config.apply_env_overrides()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_logging(&config.logging);

    let validation = config.validate().context("Invalid configuration")?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let handler = DocumentHandler::from_config(&config)
        .context("Failed to initialize document handler")?;

    let report = handler.preload(&config.documents).await;
    if !config.documents.is_empty() {
        info!(
            loaded = report.loaded,
            existing = report.existing,
            failed = report.failed.len(),
            "Static documents loaded"
        );
    }

    haste::http::serve(&config, handler).await
}

/// Loads an explicit config path, or the default one if it exists.
fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Config::load_from(default)
            } else {
                Ok(Config::default())
            }
        },
    }
}
