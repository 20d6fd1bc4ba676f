use anyhow::Result;
use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;

use annsuraksha_ledger::config::Config;
use annsuraksha_ledger::seed::{seed, SeedOptions, SEED_PASSWORD};

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Users to create; the first is an admin
    #[arg(long, default_value_t = 50)]
    pub users: usize,

    /// Fair Price Shops to create
    #[arg(long, default_value_t = 15)]
    pub fps: usize,

    /// Deliveries to create
    #[arg(long, default_value_t = 200)]
    pub deliveries: usize,

    /// Fixed RNG seed for a reproducible data set
    #[arg(long)]
    pub rng_seed: Option<u64>,
}

pub async fn run(config: &Config, args: SeedArgs) -> Result<()> {
    anyhow::ensure!(args.users >= 1, "--users must be at least 1");

    let storage = super::open_storage(config).await?;
    let mut rng = match args.rng_seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => StdRng::from_entropy(),
    };

    let options = SeedOptions {
        users: args.users,
        fps: args.fps,
        deliveries: args.deliveries,
    };
    let report = seed(&storage, &options, &mut rng).await?;
    storage.close().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("All seeded accounts use the password {:?}", SEED_PASSWORD);
    Ok(())
}
