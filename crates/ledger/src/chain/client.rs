//! alloy-backed [`ChainMirror`].

use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{PendingTransactionBuilder, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::contract::SupplyChain;
use super::{ChainDelivery, ChainMirror, ChainProposal, ChainReceipt, DeliveryLog, LoggedDelivery};
use crate::config::ChainConfig;

// Provider returned by `ProviderBuilder::new().with_recommended_fillers().wallet(..).on_http(..)`.
type WalletProvider = alloy::providers::fillers::FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::fillers::JoinFill<
            alloy::providers::Identity,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::GasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::BlobGasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::NonceFiller,
                        alloy::providers::fillers::ChainIdFiller,
                    >,
                >,
            >,
        >,
        alloy::providers::fillers::WalletFiller<EthereumWallet>,
    >,
    alloy::providers::RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

type Contract = SupplyChain::SupplyChainInstance<Http<Client>, WalletProvider>;

/// Sends contract calls through an HTTP provider with a local signer.
pub struct AlloyMirror {
    contract: Contract,
    sender: Address,
    receipt_timeout: Duration,
}

impl AlloyMirror {
    /// Connect using a chain section from the configuration.
    ///
    /// Fails if the key does not parse or does not match `account_address`.
    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        let signer = config
            .private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .context("Failed to parse chain private key")?;

        if let Some(expected) = config.account_address {
            if expected != signer.address() {
                anyhow::bail!(
                    "Private key belongs to {} but account_address is {}",
                    signer.address(),
                    expected
                );
            }
        }

        Self::new(
            &config.rpc_url,
            signer,
            config.contract_address,
            config.receipt_timeout(),
        )
    }

    /// Connect to `rpc_url` and bind the contract at `contract_address`.
    pub fn new(
        rpc_url: &str,
        signer: PrivateKeySigner,
        contract_address: Address,
        receipt_timeout: Duration,
    ) -> Result<Self> {
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(rpc_url.parse().context("Invalid RPC URL")?);

        info!(
            "Chain mirror connected: contract {} as {}",
            contract_address, sender
        );

        Ok(Self {
            contract: SupplyChain::new(contract_address, provider),
            sender,
            receipt_timeout,
        })
    }

    /// Wait for a sent transaction and reject reverts.
    async fn confirm(
        &self,
        call: &str,
        pending: PendingTransactionBuilder<Http<Client>, Ethereum>,
    ) -> Result<TransactionReceipt> {
        let tx_hash = *pending.tx_hash();
        info!("{} sent: 0x{}", call, hex::encode(tx_hash));

        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "{} 0x{} not mined within {}s",
                    call,
                    hex::encode(tx_hash),
                    self.receipt_timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to get {} receipt", call))?;

        if !receipt.status() {
            warn!(
                "{} reverted: 0x{} in block {}",
                call,
                hex::encode(receipt.transaction_hash),
                receipt.block_number.unwrap_or_default()
            );
            anyhow::bail!(
                "{} reverted: 0x{}",
                call,
                hex::encode(receipt.transaction_hash)
            );
        }

        debug!(
            "{} mined in block {} (gas used: {})",
            call,
            receipt.block_number.unwrap_or_default(),
            receipt.gas_used
        );

        Ok(receipt)
    }
}

fn to_receipt(receipt: &TransactionReceipt) -> ChainReceipt {
    ChainReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
    }
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    value
        .try_into()
        .map_err(|_| anyhow::anyhow!("{} too large: {}", what, value))
}

#[async_trait]
impl ChainMirror for AlloyMirror {
    fn is_online(&self) -> bool {
        true
    }

    fn sender(&self) -> Option<Address> {
        Some(self.sender)
    }

    async fn log_delivery(&self, delivery: &DeliveryLog) -> Result<Option<LoggedDelivery>> {
        let pending = self
            .contract
            .logDelivery(
                delivery.beneficiary,
                Bytes::copy_from_slice(delivery.fps_code.as_bytes()),
                Bytes::copy_from_slice(delivery.location.as_bytes()),
                U256::from(delivery.amount),
                delivery.ipfs_hash.clone(),
            )
            .send()
            .await
            .context("Failed to send logDelivery transaction")?;
        let receipt = self.confirm("logDelivery", pending).await?;

        let from_event = receipt.inner.logs().iter().find_map(|log| {
            SupplyChain::DeliveryLogged::decode_log(log.as_ref(), true)
                .ok()
                .map(|event| event.deliveryId)
        });

        let delivery_id = match from_event {
            Some(id) => to_u64(id, "Delivery id")?,
            None => {
                debug!("No DeliveryLogged event in receipt, reading nextDeliveryId");
                self.next_delivery_id()
                    .await?
                    .checked_sub(1)
                    .context("nextDeliveryId is zero after logDelivery")?
            }
        };

        Ok(Some(LoggedDelivery {
            receipt: to_receipt(&receipt),
            delivery_id,
        }))
    }

    async fn confirm_delivery(&self, delivery_id: u64) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .confirmDelivery(U256::from(delivery_id))
            .send()
            .await
            .context("Failed to send confirmDelivery transaction")?;
        let receipt = self.confirm("confirmDelivery", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn file_complaint(&self, delivery_id: u64, reason: &str) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .fileComplaint(U256::from(delivery_id), reason.to_string())
            .send()
            .await
            .context("Failed to send fileComplaint transaction")?;
        let receipt = self.confirm("fileComplaint", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn resolve_dispute(
        &self,
        delivery_id: u64,
        dealer_at_fault: bool,
    ) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .resolveDispute(U256::from(delivery_id), dealer_at_fault)
            .send()
            .await
            .context("Failed to send resolveDispute transaction")?;
        let receipt = self.confirm("resolveDispute", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn set_dealer_authorization(
        &self,
        dealer: Address,
        authorized: bool,
    ) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .setDealerAuthorization(dealer, authorized)
            .send()
            .await
            .context("Failed to send setDealerAuthorization transaction")?;
        let receipt = self.confirm("setDealerAuthorization", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn create_proposal(
        &self,
        target: Address,
        payload: Bytes,
        description: &str,
    ) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .createProposal(target, payload, description.to_string())
            .send()
            .await
            .context("Failed to send createProposal transaction")?;
        let receipt = self.confirm("createProposal", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn cast_vote(&self, proposal_id: u64, support: bool) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .castVote(U256::from(proposal_id), support)
            .send()
            .await
            .context("Failed to send castVote transaction")?;
        let receipt = self.confirm("castVote", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn execute_proposal(&self, proposal_id: u64) -> Result<Option<ChainReceipt>> {
        let pending = self
            .contract
            .executeProposal(U256::from(proposal_id))
            .send()
            .await
            .context("Failed to send executeProposal transaction")?;
        let receipt = self.confirm("executeProposal", pending).await?;
        Ok(Some(to_receipt(&receipt)))
    }

    async fn next_delivery_id(&self) -> Result<u64> {
        let next = self
            .contract
            .nextDeliveryId()
            .call()
            .await
            .context("Failed to query nextDeliveryId")?
            ._0;
        to_u64(next, "nextDeliveryId")
    }

    async fn delivery(&self, delivery_id: u64) -> Result<ChainDelivery> {
        let d = self
            .contract
            .deliveries(U256::from(delivery_id))
            .call()
            .await
            .with_context(|| format!("Failed to query delivery {}", delivery_id))?;

        Ok(ChainDelivery {
            dealer: d.dealer,
            beneficiary: d.beneficiary,
            fps_code: String::from_utf8_lossy(&d.fpsCode).into_owned(),
            location: String::from_utf8_lossy(&d.location).into_owned(),
            amount: d.amount,
            delivery_time: d.deliveryTime,
            collection_time: d.collectionTime,
            status: d.status,
            ipfs_hash: d.ipfsHash,
        })
    }

    async fn proposal(&self, proposal_id: u64) -> Result<ChainProposal> {
        let p = self
            .contract
            .proposals(U256::from(proposal_id))
            .call()
            .await
            .with_context(|| format!("Failed to query proposal {}", proposal_id))?;

        Ok(ChainProposal {
            target: p.target,
            payload: p.payload,
            description: p.description,
            vote_end: p.voteEnd,
            for_votes: p.forVotes,
            against_votes: p.againstVotes,
            executed: p.executed,
        })
    }

    async fn dealer_reputation(&self, dealer: Address) -> Result<U256> {
        Ok(self
            .contract
            .dealerReputation(dealer)
            .call()
            .await
            .with_context(|| format!("Failed to query reputation of {}", dealer))?
            ._0)
    }
}
