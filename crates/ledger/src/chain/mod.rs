//! Smart-contract mirror.
//!
//! Workflows talk to the contract through [`ChainMirror`]. [`AlloyMirror`]
//! sends real transactions, [`OfflineMirror`] is used when no chain is
//! configured. With the `test-support` feature, `RecordingMirror` keeps
//! calls in memory for tests.

use alloy::primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::ChainConfig;

pub mod client;
pub mod contract;
#[cfg(any(test, feature = "test-support"))]
pub mod recording;

pub use client::AlloyMirror;
#[cfg(any(test, feature = "test-support"))]
pub use recording::{ChainCall, RecordingMirror};

/// A mined, successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainReceipt {
    /// Transaction hash.
    pub tx_hash: B256,
    /// Block the transaction landed in.
    pub block_number: Option<u64>,
}

/// Receipt of `logDelivery` plus the contract-side delivery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoggedDelivery {
    /// Transaction receipt.
    pub receipt: ChainReceipt,
    /// Id assigned by the contract.
    pub delivery_id: u64,
}

/// Arguments of `logDelivery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLog {
    /// Beneficiary wallet.
    pub beneficiary: Address,
    /// Fair Price Shop code.
    pub fps_code: String,
    /// `"lat,lon"` text.
    pub location: String,
    /// Amount in rupees.
    pub amount: u64,
    /// IPFS evidence hash; empty when there is none.
    pub ipfs_hash: String,
}

/// A delivery as the contract stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainDelivery {
    /// Dealer that logged it.
    pub dealer: Address,
    /// Beneficiary wallet.
    pub beneficiary: Address,
    /// Fair Price Shop code.
    pub fps_code: String,
    /// Location text.
    pub location: String,
    /// Amount.
    pub amount: U256,
    /// Unix delivery time.
    pub delivery_time: U256,
    /// Unix collection time, zero until confirmed.
    pub collection_time: U256,
    /// Raw status code (0..=3).
    pub status: u8,
    /// IPFS evidence hash.
    pub ipfs_hash: String,
}

/// A governance proposal as the contract stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainProposal {
    /// Contract the proposal calls.
    pub target: Address,
    /// Encoded call.
    pub payload: Bytes,
    /// Human description.
    pub description: String,
    /// Unix end of voting.
    pub vote_end: U256,
    /// Votes in favor.
    pub for_votes: U256,
    /// Votes against.
    pub against_votes: U256,
    /// Whether it was executed.
    pub executed: bool,
}

/// Contract operations used by the workflows and the CLI.
///
/// State-changing calls return `Ok(None)` when the mirror is offline and
/// nothing was sent. An `Err` means the transaction failed to send, was not
/// mined within the receipt timeout, or reverted.
#[async_trait]
pub trait ChainMirror: Send + Sync {
    /// Whether calls reach a chain.
    fn is_online(&self) -> bool;

    /// Address transactions are sent from.
    fn sender(&self) -> Option<Address>;

    /// `logDelivery`, returning the contract-side id.
    async fn log_delivery(&self, delivery: &DeliveryLog) -> Result<Option<LoggedDelivery>>;

    /// `confirmDelivery`.
    async fn confirm_delivery(&self, delivery_id: u64) -> Result<Option<ChainReceipt>>;

    /// `fileComplaint`.
    async fn file_complaint(&self, delivery_id: u64, reason: &str) -> Result<Option<ChainReceipt>>;

    /// `resolveDispute`.
    async fn resolve_dispute(
        &self,
        delivery_id: u64,
        dealer_at_fault: bool,
    ) -> Result<Option<ChainReceipt>>;

    /// `setDealerAuthorization`.
    async fn set_dealer_authorization(
        &self,
        dealer: Address,
        authorized: bool,
    ) -> Result<Option<ChainReceipt>>;

    /// `createProposal`.
    async fn create_proposal(
        &self,
        target: Address,
        payload: Bytes,
        description: &str,
    ) -> Result<Option<ChainReceipt>>;

    /// `castVote`.
    async fn cast_vote(&self, proposal_id: u64, support: bool) -> Result<Option<ChainReceipt>>;

    /// `executeProposal`.
    async fn execute_proposal(&self, proposal_id: u64) -> Result<Option<ChainReceipt>>;

    /// `nextDeliveryId()`.
    async fn next_delivery_id(&self) -> Result<u64>;

    /// `deliveries(id)`.
    async fn delivery(&self, delivery_id: u64) -> Result<ChainDelivery>;

    /// `proposals(id)`.
    async fn proposal(&self, proposal_id: u64) -> Result<ChainProposal>;

    /// `dealerReputation(address)`.
    async fn dealer_reputation(&self, dealer: Address) -> Result<U256>;
}

/// Mirror used when no chain is configured. Writes are skipped, reads fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineMirror;

fn offline() -> anyhow::Error {
    anyhow::anyhow!("No chain configured")
}

#[async_trait]
impl ChainMirror for OfflineMirror {
    fn is_online(&self) -> bool {
        false
    }

    fn sender(&self) -> Option<Address> {
        None
    }

    async fn log_delivery(&self, _delivery: &DeliveryLog) -> Result<Option<LoggedDelivery>> {
        Ok(None)
    }

    async fn confirm_delivery(&self, _delivery_id: u64) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn file_complaint(&self, _delivery_id: u64, _reason: &str) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn resolve_dispute(&self, _delivery_id: u64, _at_fault: bool) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn set_dealer_authorization(
        &self,
        _dealer: Address,
        _authorized: bool,
    ) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn create_proposal(
        &self,
        _target: Address,
        _payload: Bytes,
        _description: &str,
    ) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn cast_vote(&self, _proposal_id: u64, _support: bool) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn execute_proposal(&self, _proposal_id: u64) -> Result<Option<ChainReceipt>> {
        Ok(None)
    }

    async fn next_delivery_id(&self) -> Result<u64> {
        Err(offline())
    }

    async fn delivery(&self, _delivery_id: u64) -> Result<ChainDelivery> {
        Err(offline())
    }

    async fn proposal(&self, _proposal_id: u64) -> Result<ChainProposal> {
        Err(offline())
    }

    async fn dealer_reputation(&self, _dealer: Address) -> Result<U256> {
        Err(offline())
    }
}

/// Mirror for an optional chain section: [`AlloyMirror`] when configured,
/// [`OfflineMirror`] otherwise.
pub fn connect(config: Option<&ChainConfig>) -> Result<Arc<dyn ChainMirror>> {
    match config {
        Some(chain) => Ok(Arc::new(AlloyMirror::from_config(chain)?)),
        None => {
            info!("No chain configured; running with the offline mirror");
            Ok(Arc::new(OfflineMirror))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_without_chain_is_offline() {
        let mirror = connect(None).unwrap();
        assert!(!mirror.is_online());
        assert!(mirror.sender().is_none());
    }

    #[tokio::test]
    async fn test_offline_mirror_skips_writes_and_fails_reads() {
        let mirror = OfflineMirror;

        assert!(!mirror.is_online());
        assert!(mirror.confirm_delivery(1).await.unwrap().is_none());
        assert!(mirror
            .set_dealer_authorization(Address::repeat_byte(1), true)
            .await
            .unwrap()
            .is_none());
        assert!(mirror.next_delivery_id().await.is_err());
        assert!(mirror.dealer_reputation(Address::ZERO).await.is_err());
    }
}
