use alloy_primitives::Address;
use anyhow::Result;
use clap::Subcommand;

use annsuraksha_ledger::config::Config;
use annsuraksha_ledger::workflow::Workflows;

#[derive(Debug, Subcommand)]
pub enum DealerCommand {
    /// Grant (or with --revoke, withdraw) a dealer's authorization.
    Authorize {
        /// Dealer wallet address (0x...)
        address: Address,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },
    /// Read a dealer's on-chain reputation.
    Reputation {
        /// Dealer wallet address (0x...)
        address: Address,
    },
}

pub async fn run(config: &Config, command: DealerCommand) -> Result<()> {
    match command {
        DealerCommand::Authorize { address, revoke } => {
            let mirror = super::online_mirror(config)?;
            let storage = super::open_storage(config).await?;
            let workflows = Workflows::new(storage.clone(), mirror);

            let receipt = workflows.authorize_dealer(address, !revoke).await?;
            println!(
                "Dealer {} {}",
                address,
                if revoke { "revoked" } else { "authorized" }
            );
            super::print_receipt(receipt);
            storage.close().await;
        }
        DealerCommand::Reputation { address } => {
            let mirror = super::online_mirror(config)?;
            let reputation = mirror.dealer_reputation(address).await?;
            println!("dealer: {}", address);
            println!("reputation: {}", reputation);
        }
    }

    Ok(())
}
