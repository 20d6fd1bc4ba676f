//! AnnSuraksha ledger service: trust monitor and model training.
//!
//! The HTTP API is provided by the separate `annsuraksha-api` service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use annsuraksha_ledger::config::Config;
use annsuraksha_ledger::monitor::{prepare_models, train_models, TrustMonitor};
use annsuraksha_ledger::storage::Storage;

#[derive(Parser)]
#[command(name = "annsuraksha-ledger")]
#[command(version, about = "AnnSuraksha trust monitor and model trainer", long_about = None)]
struct Cli {
    /// Path to configuration file (environment variables are used if it does not exist)
    #[arg(short, long, default_value = "annsuraksha.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trust monitor
    Run,

    /// Retrain the anomaly models and save a snapshot
    Train,

    /// Show database and model status
    Status,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = "sqlite://annsuraksha.db")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Failed to load configuration")?;

    annsuraksha_ledger::logging::init(cli.debug, &config.logging, &["annsuraksha_ledger"])?;

    info!("AnnSuraksha ledger starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_monitor(config).await?,
        Commands::Train => train(&config).await?,
        Commands::Status => show_status(&config).await?,
        Commands::InitDb { database_url } => init_database(&database_url).await?,
    }

    Ok(())
}

async fn open_storage(config: &Config) -> Result<Storage> {
    let storage = Storage::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    Ok(storage)
}

/// Run the monitor until it fails or a shutdown signal arrives.
async fn run_monitor(config: Config) -> Result<()> {
    info!("Configuration loaded successfully");
    info!("  Database: {}", config.database.url);
    info!("  Model dir: {}", config.models.dir.display());
    info!(
        "  Low-trust threshold: {}, fraud threshold: {}",
        config.monitor.low_trust_threshold, config.monitor.fraud_threshold
    );

    let storage = open_storage(&config).await?;
    info!("Database initialized");

    let mut rng = StdRng::from_entropy();
    let models = match prepare_models(&storage, &config.models, &mut rng).await {
        Ok(models) => models,
        Err(e) => {
            warn!("Model preparation failed, monitor will wait for a snapshot: {:#}", e);
            annsuraksha_scoring::Models::new(config.models.params)
        }
    };

    let monitor = TrustMonitor::new(
        storage.clone(),
        models,
        Some(config.models.dir.clone()),
        config.monitor.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run());

    info!("Trust monitor is running. Press Ctrl+C to stop.");

    let result = tokio::select! {
        result = monitor_handle => {
            match result {
                Ok(Ok(())) => {
                    warn!("Trust monitor exited unexpectedly");
                    Ok(())
                }
                Ok(Err(e)) => Err(e).context("Trust monitor failed"),
                Err(e) => Err(anyhow::anyhow!("Trust monitor task panicked: {}", e)),
            }
        }
        result = shutdown_signal() => {
            result?;
            info!("Received shutdown signal, gracefully shutting down...");
            Ok(())
        }
    };

    storage.close().await;
    result
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to listen for SIGTERM")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl+C"),
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")
    }
}

/// Retrain from the current database and overwrite the snapshot.
async fn train(config: &Config) -> Result<()> {
    let storage = open_storage(config).await?;

    let mut rng = StdRng::from_entropy();
    let models = train_models(&storage, &config.models, &mut rng).await?;
    models
        .save(&config.models.dir)
        .with_context(|| format!("Failed to save models to {}", config.models.dir.display()))?;

    if let Some(snapshot) = models.snapshot() {
        info!(
            "Models trained on {} rows (baseline: {})",
            snapshot.trust_rows.len(),
            snapshot.baseline
        );
    }

    storage.close().await;
    Ok(())
}

/// Print database counters and model snapshot state.
async fn show_status(config: &Config) -> Result<()> {
    let storage = open_storage(config).await?;
    let stats = storage.stats().await?;
    let metrics = storage.live_metrics().await?;

    println!("\n=== AnnSuraksha Ledger Status ===\n");
    println!("Database: {}", config.database.url);
    println!("  Users: {}", stats.user_count);
    println!("  Deliveries: {}", stats.delivery_count);
    println!(
        "    Pending: {}  Delivered: {}  Disputed: {}  Resolved: {}",
        metrics.pending_deliveries,
        metrics.delivered_deliveries,
        metrics.disputed_deliveries,
        metrics.resolved_deliveries
    );
    println!("  Complaints: {}", stats.complaint_count);
    println!("  Average trust score: {:.2}", metrics.avg_trust_score);

    println!("\nChain:");
    match &config.chain {
        Some(chain) => {
            println!("  RPC URL: {}", chain.rpc_url);
            println!("  Chain ID: {}", chain.chain_id);
            println!("  Contract: {}", chain.contract_address);
        }
        None => println!("  Not configured (offline mirror)"),
    }

    println!("\nModels ({}):", config.models.dir.display());
    print_model_status(&config.models.dir, config);

    println!();
    storage.close().await;
    Ok(())
}

fn print_model_status(dir: &Path, config: &Config) {
    let models = annsuraksha_scoring::Models::load(config.models.params, dir);
    match models.snapshot() {
        Some(snapshot) => {
            println!("  Trained at: {}", snapshot.trained_at.to_rfc3339());
            println!("  Training rows: {}", snapshot.trust_rows.len());
            println!("  Baseline: {}", snapshot.baseline);
        }
        None => println!("  No snapshot; run `annsuraksha-ledger train`"),
    }
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    let stats = storage.stats().await?;
    info!("Database initialized successfully!");
    info!("  Users: {}", stats.user_count);
    info!("  Deliveries: {}", stats.delivery_count);
    info!("  Complaints: {}", stats.complaint_count);

    storage.close().await;

    Ok(())
}
