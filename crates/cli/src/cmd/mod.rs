use anyhow::{Context, Result};
use std::sync::Arc;

use annsuraksha_ledger::chain::{self, ChainMirror, ChainReceipt};
use annsuraksha_ledger::config::Config;
use annsuraksha_ledger::storage::Storage;

pub mod dealer;
pub mod delivery;
pub mod proposal;
pub mod seed;

/// Open the configured database and bring its schema up to date.
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

/// Contract client for commands that only make sense against a live chain.
fn online_mirror(config: &Config) -> Result<Arc<dyn ChainMirror>> {
    let mirror = chain::connect(config.chain.as_ref())?;
    anyhow::ensure!(
        mirror.is_online(),
        "No chain configured; set the [chain] section or WEB3_PROVIDER_URI, CONTRACT_ADDRESS and PRIVATE_KEY"
    );
    Ok(mirror)
}

fn print_receipt(receipt: Option<ChainReceipt>) {
    match receipt {
        Some(receipt) => {
            println!("txHash: {}", receipt.tx_hash);
            if let Some(block) = receipt.block_number {
                println!("block: {}", block);
            }
        }
        None => println!("No transaction sent (offline)"),
    }
}
