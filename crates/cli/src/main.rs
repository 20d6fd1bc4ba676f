use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use annsuraksha_ledger::config::Config;

mod cmd;

#[derive(Debug, Parser)]
#[command(name = "annsuraksha")]
#[command(about = "AnnSuraksha operator CLI")]
struct Cli {
    /// Path to configuration file (environment variables are used if it does not exist)
    #[arg(short, long, global = true, default_value = "annsuraksha.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wipe the database and fill it with synthetic users, shops and deliveries.
    Seed(cmd::seed::SeedArgs),
    /// Dealer authorization and reputation on the contract.
    #[command(subcommand)]
    Dealer(cmd::dealer::DealerCommand),
    /// Governance proposals on the contract.
    #[command(subcommand)]
    Proposal(cmd::proposal::ProposalCommand),
    /// Read deliveries stored on the contract.
    #[command(subcommand)]
    Delivery(cmd::delivery::DeliveryCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("Failed to load configuration")?;

    annsuraksha_ledger::logging::init(
        cli.debug,
        &config.logging,
        &["annsuraksha", "annsuraksha_ledger"],
    )?;

    match cli.command {
        Command::Seed(args) => cmd::seed::run(&config, args).await?,
        Command::Dealer(command) => cmd::dealer::run(&config, command).await?,
        Command::Proposal(command) => cmd::proposal::run(&config, command).await?,
        Command::Delivery(command) => cmd::delivery::run(&config, command).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dealer_authorize() {
        let cli = Cli::try_parse_from([
            "annsuraksha",
            "dealer",
            "authorize",
            "0x00000000000000000000000000000000000000aa",
            "--revoke",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Dealer(cmd::dealer::DealerCommand::Authorize { revoke: true, .. })
        ));
        assert_eq!(cli.config, PathBuf::from("annsuraksha.toml"));
    }

    #[test]
    fn test_parse_seed_defaults() {
        let cli = Cli::try_parse_from(["annsuraksha", "--debug", "seed"]).unwrap();
        assert!(cli.debug);
        let Command::Seed(args) = cli.command else {
            panic!("expected seed");
        };
        assert_eq!(args.users, 50);
        assert_eq!(args.fps, 15);
        assert_eq!(args.deliveries, 200);
        assert!(args.rng_seed.is_none());
    }
}
