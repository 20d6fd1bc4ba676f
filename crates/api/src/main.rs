use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use annsuraksha_api::server::run_with_config;
use annsuraksha_ledger::config::Config;

#[derive(Parser)]
#[command(name = "annsuraksha-api")]
#[command(version, about = "AnnSuraksha HTTP API", long_about = None)]
struct Cli {
    /// Path to configuration file (environment variables are used if it does not exist)
    #[arg(short, long, default_value = "annsuraksha.toml")]
    config: PathBuf,

    /// Override the listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.api.port = port;
    }

    annsuraksha_ledger::logging::init(
        cli.debug,
        &config.logging,
        &["annsuraksha_api", "annsuraksha_ledger"],
    )?;

    info!("AnnSuraksha API starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("  Database: {}", config.database.url);
    match &config.chain {
        Some(chain) => info!("  Chain: {} (contract {})", chain.rpc_url, chain.contract_address),
        None => info!("  Chain: offline"),
    }

    run_with_config(config).await
}
