use anyhow::Result;
use clap::Subcommand;

use annsuraksha_core::chain_status_label;
use annsuraksha_ledger::config::Config;

#[derive(Debug, Subcommand)]
pub enum DeliveryCommand {
    /// Show a delivery as stored on the contract.
    Show {
        /// Contract-side delivery id
        id: u64,
    },
    /// Print the id the contract will assign to the next delivery.
    NextId,
}

pub async fn run(config: &Config, command: DeliveryCommand) -> Result<()> {
    let mirror = super::online_mirror(config)?;

    match command {
        DeliveryCommand::Show { id } => {
            let delivery = mirror.delivery(id).await?;
            println!("delivery: {}", id);
            println!("dealer: {}", delivery.dealer);
            println!("beneficiary: {}", delivery.beneficiary);
            println!("fpsCode: {}", delivery.fps_code);
            println!("location: {}", delivery.location);
            println!("amount: {}", delivery.amount);
            println!("deliveryTime: {}", delivery.delivery_time);
            println!("collectionTime: {}", delivery.collection_time);
            println!("status: {}", chain_status_label(delivery.status));
            if !delivery.ipfs_hash.is_empty() {
                println!("ipfsHash: {}", delivery.ipfs_hash);
            }
        }
        DeliveryCommand::NextId => {
            println!("{}", mirror.next_delivery_id().await?);
        }
    }

    Ok(())
}
