//! In-memory [`ChainMirror`] that records calls.
//!
//! Used by workflow and API tests in place of a node.

use alloy::primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{ChainDelivery, ChainMirror, ChainProposal, ChainReceipt, DeliveryLog, LoggedDelivery};

/// A call received by [`RecordingMirror`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    /// `logDelivery`
    LogDelivery(DeliveryLog),
    /// `confirmDelivery`
    ConfirmDelivery(u64),
    /// `fileComplaint`
    FileComplaint(u64, String),
    /// `resolveDispute`
    ResolveDispute(u64, bool),
    /// `setDealerAuthorization`
    SetDealerAuthorization(Address, bool),
    /// `createProposal`
    CreateProposal(Address, Bytes, String),
    /// `castVote`
    CastVote(u64, bool),
    /// `executeProposal`
    ExecuteProposal(u64),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ChainCall>,
    deliveries: HashMap<u64, ChainDelivery>,
    authorized: HashMap<Address, bool>,
    next_delivery_id: u64,
}

/// Online mirror that keeps everything in memory.
///
/// Every successful write gets a distinct fake transaction hash. With
/// [`RecordingMirror::set_failing`] every write fails instead, as a
/// reverted transaction would.
#[derive(Debug, Default)]
pub struct RecordingMirror {
    state: Mutex<State>,
    failing: AtomicBool,
}

impl RecordingMirror {
    /// Empty mirror; the first logged delivery gets id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<ChainCall> {
        self.lock().calls.clone()
    }

    /// Current authorization of a dealer.
    pub fn is_authorized(&self, dealer: Address) -> bool {
        self.lock().authorized.get(&dealer).copied().unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: ChainCall) -> Result<ChainReceipt> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Transaction reverted: {:?}", call);
        }

        let mut state = self.lock();
        state.calls.push(call);
        let n = state.calls.len() as u64;
        Ok(ChainReceipt {
            tx_hash: B256::left_padding_from(&n.to_be_bytes()),
            block_number: Some(n),
        })
    }

    fn set_status(&self, delivery_id: u64, status: u8) -> Result<()> {
        let mut state = self.lock();
        let delivery = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown chain delivery {}", delivery_id))?;
        delivery.status = status;
        Ok(())
    }
}

#[async_trait]
impl ChainMirror for RecordingMirror {
    fn is_online(&self) -> bool {
        true
    }

    fn sender(&self) -> Option<Address> {
        Some(Address::repeat_byte(0xD0))
    }

    async fn log_delivery(&self, delivery: &DeliveryLog) -> Result<Option<LoggedDelivery>> {
        let receipt = self.record(ChainCall::LogDelivery(delivery.clone()))?;

        let mut state = self.lock();
        let delivery_id = state.next_delivery_id;
        state.next_delivery_id += 1;
        state.deliveries.insert(
            delivery_id,
            ChainDelivery {
                dealer: Address::repeat_byte(0xD0),
                beneficiary: delivery.beneficiary,
                fps_code: delivery.fps_code.clone(),
                location: delivery.location.clone(),
                amount: U256::from(delivery.amount),
                delivery_time: U256::ZERO,
                collection_time: U256::ZERO,
                status: 0,
                ipfs_hash: delivery.ipfs_hash.clone(),
            },
        );

        Ok(Some(LoggedDelivery {
            receipt,
            delivery_id,
        }))
    }

    async fn confirm_delivery(&self, delivery_id: u64) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::ConfirmDelivery(delivery_id))?;
        self.set_status(delivery_id, 1)?;
        Ok(Some(receipt))
    }

    async fn file_complaint(&self, delivery_id: u64, reason: &str) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::FileComplaint(delivery_id, reason.to_string()))?;
        self.set_status(delivery_id, 2)?;
        Ok(Some(receipt))
    }

    async fn resolve_dispute(
        &self,
        delivery_id: u64,
        dealer_at_fault: bool,
    ) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::ResolveDispute(delivery_id, dealer_at_fault))?;
        self.set_status(delivery_id, 3)?;
        Ok(Some(receipt))
    }

    async fn set_dealer_authorization(
        &self,
        dealer: Address,
        authorized: bool,
    ) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::SetDealerAuthorization(dealer, authorized))?;
        self.lock().authorized.insert(dealer, authorized);
        Ok(Some(receipt))
    }

    async fn create_proposal(
        &self,
        target: Address,
        payload: Bytes,
        description: &str,
    ) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::CreateProposal(
            target,
            payload,
            description.to_string(),
        ))?;
        Ok(Some(receipt))
    }

    async fn cast_vote(&self, proposal_id: u64, support: bool) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::CastVote(proposal_id, support))?;
        Ok(Some(receipt))
    }

    async fn execute_proposal(&self, proposal_id: u64) -> Result<Option<ChainReceipt>> {
        let receipt = self.record(ChainCall::ExecuteProposal(proposal_id))?;
        Ok(Some(receipt))
    }

    async fn next_delivery_id(&self) -> Result<u64> {
        Ok(self.lock().next_delivery_id)
    }

    async fn delivery(&self, delivery_id: u64) -> Result<ChainDelivery> {
        self.lock()
            .deliveries
            .get(&delivery_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Unknown chain delivery {}", delivery_id))
    }

    async fn proposal(&self, proposal_id: u64) -> Result<ChainProposal> {
        let state = self.lock();
        let created = state
            .calls
            .iter()
            .filter_map(|call| match call {
                ChainCall::CreateProposal(target, payload, description) => {
                    Some((*target, payload.clone(), description.clone()))
                }
                _ => None,
            })
            .nth(proposal_id as usize)
            .ok_or_else(|| anyhow::anyhow!("Unknown proposal {}", proposal_id))?;

        let (for_votes, against_votes) = state.calls.iter().fold((0u64, 0u64), |acc, call| {
            match call {
                ChainCall::CastVote(id, true) if *id == proposal_id => (acc.0 + 1, acc.1),
                ChainCall::CastVote(id, false) if *id == proposal_id => (acc.0, acc.1 + 1),
                _ => acc,
            }
        });
        let executed = state
            .calls
            .iter()
            .any(|call| *call == ChainCall::ExecuteProposal(proposal_id));

        Ok(ChainProposal {
            target: created.0,
            payload: created.1,
            description: created.2,
            vote_end: U256::ZERO,
            for_votes: U256::from(for_votes),
            against_votes: U256::from(against_votes),
            executed,
        })
    }

    async fn dealer_reputation(&self, dealer: Address) -> Result<U256> {
        let state = self.lock();
        let resolved_against = state
            .calls
            .iter()
            .filter(|call| matches!(call, ChainCall::ResolveDispute(_, true)))
            .count() as u64;
        let authorized = state.authorized.get(&dealer).copied().unwrap_or(false);
        Ok(if authorized {
            U256::from(100u64.saturating_sub(resolved_against))
        } else {
            U256::ZERO
        })
    }
}
