//! Presence Reporter - network presence sensors reported over MQTT or REST
//!
//! This agent:
//! - Loads the sensor list from a TOML config file
//! - Publishes every sensor's initial state, then polls each on its own interval
//! - Republishes everything when a message arrives on the MQTT request topic
//! - Disconnects cleanly on SIGINT / SIGTERM / SIGHUP

use anyhow::{Context, Result};
use clap::Parser;
use presence_reporter::{logging, Reporter, ReporterConfig, Shutdown};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "presence-reporter", version, about)]
struct Cli {
    /// Config file (defaults to <config dir>/presence-reporter/config.toml)
    #[arg(short, long, env = "PRESENCE_REPORTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(path) => path,
        None => ReporterConfig::default_path().context("No config file specified on the command line")?,
    };
    let config = ReporterConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    logging::init(&config.logging);
    info!("---------------Started ({})", path.display());

    let reporter = Reporter::build(&config)
        .await
        .context("Failed to start reporter")?;

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().on_signal());

    reporter.run(shutdown).await;
    info!("Presence reporter stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_config_flag() {
        let cli = Cli::try_parse_from(["presence-reporter", "-c", "/etc/presence.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/presence.toml")));
    }
}
