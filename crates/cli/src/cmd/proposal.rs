use alloy_primitives::{Address, Bytes};
use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use annsuraksha_ledger::config::Config;

#[derive(Debug, Subcommand)]
pub enum ProposalCommand {
    /// Create a proposal that calls `target` with `payload` when executed.
    Create {
        /// Contract the proposal will call (0x...)
        #[arg(long)]
        target: Address,
        /// ABI-encoded call data (hex, with or without 0x)
        #[arg(long, default_value = "0x")]
        payload: String,
        /// Human-readable description
        #[arg(long)]
        description: String,
    },
    /// Vote on a proposal (in favor unless --against).
    Vote {
        /// Proposal id
        id: u64,
        /// Vote against
        #[arg(long)]
        against: bool,
    },
    /// Execute a proposal whose voting period has ended.
    Execute {
        /// Proposal id
        id: u64,
    },
    /// Show a proposal as stored on the contract.
    Show {
        /// Proposal id
        id: u64,
    },
}

pub async fn run(config: &Config, command: ProposalCommand) -> Result<()> {
    let mirror = super::online_mirror(config)?;

    match command {
        ProposalCommand::Create {
            target,
            payload,
            description,
        } => {
            let payload = parse_payload(&payload)?;
            info!(%target, bytes = payload.len(), "Creating proposal");
            let receipt = mirror.create_proposal(target, payload, &description).await?;
            super::print_receipt(receipt);
        }
        ProposalCommand::Vote { id, against } => {
            let receipt = mirror.cast_vote(id, !against).await?;
            println!(
                "Voted {} proposal {}",
                if against { "against" } else { "for" },
                id
            );
            super::print_receipt(receipt);
        }
        ProposalCommand::Execute { id } => {
            let receipt = mirror.execute_proposal(id).await?;
            println!("Executed proposal {}", id);
            super::print_receipt(receipt);
        }
        ProposalCommand::Show { id } => {
            let proposal = mirror.proposal(id).await?;
            println!("proposal: {}", id);
            println!("target: {}", proposal.target);
            println!("payload: {}", proposal.payload);
            println!("description: {}", proposal.description);
            println!("voteEnd: {}", proposal.vote_end);
            println!("for: {}", proposal.for_votes);
            println!("against: {}", proposal.against_votes);
            println!("executed: {}", proposal.executed);
        }
    }

    Ok(())
}

fn parse_payload(s: &str) -> Result<Bytes> {
    let trimmed = s.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_str).with_context(|| format!("Invalid payload hex: {}", s))?;
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        assert!(parse_payload("0x").unwrap().is_empty());
        assert_eq!(parse_payload("0xdeadbeef").unwrap().as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_payload("  cafe ").unwrap().as_ref(), &[0xca, 0xfe]);
        assert!(parse_payload("0xzz").is_err());
        assert!(parse_payload("0xabc").is_err());
    }
}
