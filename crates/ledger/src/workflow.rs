//! Chain-mirror workflows.
//!
//! Every state-changing action calls the contract first and waits for the
//! receipt, then writes the database. A chain failure aborts before any
//! database write. A database failure after a mined transaction leaves the
//! chain ahead of the database; that case is logged and returned as a
//! storage error.

use alloy::primitives::{Address, B256};
use annsuraksha_core::{
    analyze_complaint_text, chain_status_label, late_collection_penalty, ComplaintAnalysis, DeliveryItem,
    DeliveryStatus, LogAction, Role, Vote, COMPLAINT_PENALTY, CONFIRMATION_REWARD,
    INITIAL_TRUST_SCORE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainMirror, ChainReceipt, DeliveryLog};
use crate::password::{hash_password, verify_password};
use crate::storage::{ComplaintRecord, DeliveryRecord, NewComplaint, NewDelivery, NewLogEntry, NewUser, Storage, UserRecord};

/// Trust reason recorded for the confirmation reward.
pub const REASON_DELIVERY_COMPLETED: &str = "Delivery completed";

/// Trust reason recorded for the late-collection penalty.
pub const REASON_LATE_COLLECTION: &str = "Late delivery penalty";

/// Trust reason recorded for the dealer complaint penalty.
pub const REASON_COMPLAINT: &str = "Quality issue reported";

/// Workflow failure, tagged by how a caller should report it.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A referenced user or delivery does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request is malformed or violates a uniqueness rule.
    #[error("{0}")]
    Invalid(String),

    /// The delivery is not in a state that allows the action.
    #[error("{0}")]
    Conflict(String),

    /// The contract call failed, timed out or reverted.
    #[error("Chain call failed: {0:#}")]
    Chain(anyhow::Error),

    /// The database failed.
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        WorkflowError::Storage(err)
    }
}

/// Result alias for workflow operations.
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Clear-text password; only its hash is stored.
    pub password: String,
    /// `beneficiary`, `dealer` or `admin`.
    pub role: String,
    /// Aadhar number.
    #[serde(default)]
    pub aadhar_number: Option<String>,
    /// Hex wallet address.
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Log-delivery request.
#[derive(Debug, Clone, Deserialize)]
pub struct LogDeliveryRequest {
    /// Beneficiary's aadhar number.
    pub aadhar_number: String,
    /// Dealer handing over the goods.
    #[serde(default)]
    pub dealer_id: Option<i64>,
    /// Fair Price Shop code.
    pub fps_code: String,
    /// `"lat,lon"` text.
    pub location: String,
    /// Amount in rupees.
    pub amount: i64,
    /// Line items.
    #[serde(default)]
    pub items: Vec<DeliveryItem>,
    /// IPFS evidence hash.
    #[serde(default)]
    pub ipfs_hash: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub delivery_time: Option<DateTime<Utc>>,
    /// Set when collection already happened.
    #[serde(default)]
    pub collection_time: Option<DateTime<Utc>>,
}

/// File-complaint request.
#[derive(Debug, Clone, Deserialize)]
pub struct FileComplaintRequest {
    /// Disputed delivery.
    pub delivery_id: i64,
    /// Complainant; defaults to the delivery's beneficiary.
    #[serde(default)]
    pub aadhar_number: Option<String>,
    /// Free text.
    pub text: String,
}

/// A stored complaint and the text analysis behind it.
#[derive(Debug, Clone)]
pub struct FiledComplaint {
    /// Stored complaint.
    pub complaint: ComplaintRecord,
    /// Keyword analysis.
    pub analysis: ComplaintAnalysis,
}

/// A stored delivery and, when checked, what the contract says about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDelivery {
    /// Stored delivery.
    #[serde(flatten)]
    pub delivery: DeliveryRecord,
    /// Status label read back from the contract.
    pub chain_status: Option<String>,
    /// Whether the contract record was read.
    pub verified: bool,
}

/// Workflow entry points over the database and the chain mirror.
#[derive(Clone)]
pub struct Workflows {
    storage: Storage,
    chain: Arc<dyn ChainMirror>,
}

impl Workflows {
    /// Bind workflows to a database and a mirror.
    pub fn new(storage: Storage, chain: Arc<dyn ChainMirror>) -> Self {
        Self { storage, chain }
    }

    /// Database handle.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Chain mirror.
    pub fn chain(&self) -> &Arc<dyn ChainMirror> {
        &self.chain
    }

    /// Register a user with an argon2-hashed password and trust score 100.
    pub async fn register_user(&self, form: RegisterUser) -> WorkflowResult<UserRecord> {
        let name = form.name.trim();
        let email = form.email.trim().to_ascii_lowercase();
        if name.is_empty() || email.is_empty() || form.password.is_empty() {
            return Err(WorkflowError::Invalid(
                "Name, email and password are required".to_string(),
            ));
        }

        let role: Role = form
            .role
            .parse()
            .map_err(|e: annsuraksha_core::CoreError| WorkflowError::Invalid(e.to_string()))?;
        let wallet_address = non_empty(form.wallet_address)
            .map(|w| w.parse::<Address>())
            .transpose()
            .map_err(|e| WorkflowError::Invalid(format!("Invalid wallet address: {}", e)))?;
        let aadhar_number = non_empty(form.aadhar_number);

        if self.storage.email_exists(&email).await? {
            return Err(WorkflowError::Invalid("Email already registered".to_string()));
        }
        if let Some(aadhar) = &aadhar_number {
            if self.storage.get_user_by_aadhar(aadhar).await?.is_some() {
                return Err(WorkflowError::Invalid(
                    "Aadhar number already registered".to_string(),
                ));
            }
        }

        let user = NewUser {
            name: name.to_string(),
            email,
            password_hash: hash_password(&form.password)?,
            role,
            trust_score: INITIAL_TRUST_SCORE,
            aadhar_number,
            wallet_address,
            phone: non_empty(form.phone),
            created_at: Utc::now(),
        };
        let id = self.storage.insert_user(&user).await?;
        info!(user_id = id, role = role.as_str(), "User registered");

        self.require_user(id).await
    }

    /// Check credentials. Returns `None` on unknown email or wrong password.
    pub async fn login(&self, email: &str, password: &str) -> WorkflowResult<Option<UserRecord>> {
        let email = email.trim().to_ascii_lowercase();
        let Some(user) = self.storage.get_user_by_email(&email).await? else {
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash)? {
            return Ok(None);
        }

        self.storage.set_last_login(user.id, Utc::now()).await?;
        Ok(Some(user))
    }

    /// Log a delivery for the beneficiary with the given aadhar number.
    pub async fn log_delivery(&self, req: LogDeliveryRequest) -> WorkflowResult<DeliveryRecord> {
        if req.fps_code.trim().is_empty() {
            return Err(WorkflowError::Invalid("fps_code is required".to_string()));
        }
        if req.amount < 0 {
            return Err(WorkflowError::Invalid("amount must not be negative".to_string()));
        }

        let beneficiary = self
            .storage
            .get_user_by_aadhar(&req.aadhar_number)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("User not found".to_string()))?;

        if let Some(dealer_id) = req.dealer_id {
            let dealer = self.storage.get_user(dealer_id).await?;
            if !matches!(dealer, Some(ref d) if d.role == Role::Dealer) {
                return Err(WorkflowError::Invalid(format!(
                    "User {} is not a dealer",
                    dealer_id
                )));
            }
        }

        let now = Utc::now();
        let delivery_time = req.delivery_time.unwrap_or(now);

        let logged = if self.chain.is_online() {
            let beneficiary_wallet = beneficiary.wallet_address.ok_or_else(|| {
                WorkflowError::Invalid("Beneficiary has no wallet address".to_string())
            })?;
            self.chain
                .log_delivery(&DeliveryLog {
                    beneficiary: beneficiary_wallet,
                    fps_code: req.fps_code.clone(),
                    location: req.location.clone(),
                    amount: req.amount as u64,
                    ipfs_hash: req.ipfs_hash.clone().unwrap_or_default(),
                })
                .await
                .map_err(WorkflowError::Chain)?
        } else {
            None
        };
        let tx_hash = logged.map(|l| l.receipt.tx_hash);

        let stored = async {
            let id = self
                .storage
                .insert_delivery(&NewDelivery {
                    user_id: beneficiary.id,
                    dealer_id: req.dealer_id,
                    fps_code: req.fps_code.clone(),
                    location: req.location.clone(),
                    amount: req.amount,
                    items: req.items.clone(),
                    ipfs_hash: req.ipfs_hash.clone(),
                    status: DeliveryStatus::Pending,
                    delivery_time,
                    collection_time: req.collection_time,
                    dispute_time: None,
                    blockchain_delivery_id: logged.map(|l| l.delivery_id),
                    tx_hash,
                    created_at: now,
                })
                .await?;

            self.storage
                .record_fps_delivery(&req.fps_code, req.dealer_id, delivery_time)
                .await?;

            let penalty = late_collection_penalty(Some(delivery_time), req.collection_time);
            let trust_score = if penalty != 0 {
                self.storage
                    .apply_trust_delta(beneficiary.id, penalty, REASON_LATE_COLLECTION, now)
                    .await?
                    .map(|c| c.new_score)
                    .unwrap_or(beneficiary.trust_score)
            } else {
                beneficiary.trust_score
            };

            self.storage
                .append_log(
                    &NewLogEntry::new(
                        LogAction::DeliveryLogged,
                        json!({
                            "aadhar_number": req.aadhar_number,
                            "fps_code": req.fps_code,
                            "amount": req.amount,
                            "trust_score": trust_score,
                            "blockchain_delivery_id": logged.map(|l| l.delivery_id),
                        }),
                    )
                    .user(beneficiary.id)
                    .delivery(id)
                    .tx(tx_hash),
                )
                .await?;

            Ok::<_, anyhow::Error>(id)
        }
        .await;

        let id = chain_ahead_on_error("log delivery", tx_hash, stored)?;
        info!(delivery_id = id, user_id = beneficiary.id, "Delivery logged");

        self.require_delivery(id).await
    }

    /// Confirm collection of a Pending delivery.
    ///
    /// The beneficiary earns the confirmation reward and, when collection is
    /// more than 24 hours after delivery, the late-collection penalty.
    pub async fn confirm_delivery(&self, delivery_id: i64) -> WorkflowResult<DeliveryRecord> {
        let delivery = self.require_delivery(delivery_id).await?;
        check_transition(&delivery, DeliveryStatus::Delivered)?;

        let receipt = match delivery.blockchain_delivery_id {
            Some(chain_id) => self
                .chain
                .confirm_delivery(chain_id)
                .await
                .map_err(WorkflowError::Chain)?,
            None => {
                debug!(delivery_id, "Delivery not mirrored on chain; skipping confirmDelivery");
                None
            }
        };
        let tx_hash = receipt.map(|r| r.tx_hash);
        let now = Utc::now();

        let stored = async {
            if !self.storage.mark_delivered(delivery_id, now, tx_hash).await? {
                return Ok(false);
            }

            let mut change = self
                .storage
                .apply_trust_delta(
                    delivery.user_id,
                    CONFIRMATION_REWARD,
                    REASON_DELIVERY_COMPLETED,
                    now,
                )
                .await?;
            let penalty = late_collection_penalty(Some(delivery.delivery_time), Some(now));
            if penalty != 0 {
                change = self
                    .storage
                    .apply_trust_delta(delivery.user_id, penalty, REASON_LATE_COLLECTION, now)
                    .await?;
            }

            self.storage
                .append_log(
                    &NewLogEntry::new(
                        LogAction::DeliveryConfirmed,
                        json!({
                            "trust_score": change.map(|c| c.new_score),
                            "late": penalty != 0,
                        }),
                    )
                    .user(delivery.user_id)
                    .delivery(delivery_id)
                    .tx(tx_hash),
                )
                .await?;

            Ok::<_, anyhow::Error>(true)
        }
        .await;

        if !chain_ahead_on_error("confirm delivery", tx_hash, stored)? {
            return Err(status_changed(delivery_id));
        }
        info!(delivery_id, "Delivery confirmed");

        self.require_delivery(delivery_id).await
    }

    /// File a complaint against a delivery and move it to Disputed.
    ///
    /// Further complaints on an already Disputed delivery are stored without
    /// another contract call.
    pub async fn file_complaint(&self, req: FileComplaintRequest) -> WorkflowResult<FiledComplaint> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(WorkflowError::Invalid("Complaint text is required".to_string()));
        }

        let delivery = self.require_delivery(req.delivery_id).await?;
        let complainant_id = match non_empty(req.aadhar_number.clone()) {
            Some(aadhar) => {
                self.storage
                    .get_user_by_aadhar(&aadhar)
                    .await?
                    .ok_or_else(|| WorkflowError::NotFound("User not found".to_string()))?
                    .id
            }
            None => delivery.user_id,
        };

        let already_disputed = delivery.status == DeliveryStatus::Disputed;
        if !already_disputed {
            check_transition(&delivery, DeliveryStatus::Disputed)?;
        }

        let analysis = analyze_complaint_text(text);

        let receipt = match delivery.blockchain_delivery_id {
            Some(chain_id) if !already_disputed => self
                .chain
                .file_complaint(chain_id, text)
                .await
                .map_err(WorkflowError::Chain)?,
            _ => None,
        };
        let tx_hash = receipt.map(|r| r.tx_hash);
        let now = Utc::now();

        let stored = async {
            if !already_disputed
                && !self
                    .storage
                    .mark_disputed(delivery.id, now, tx_hash)
                    .await?
            {
                return Ok(None);
            }

            let complaint_id = self
                .storage
                .insert_complaint(&NewComplaint {
                    delivery_id: delivery.id,
                    user_id: complainant_id,
                    text: text.to_string(),
                    category: analysis.category.clone(),
                    severity: analysis.severity(),
                    priority: analysis.priority(),
                    tx_hash,
                    created_at: now,
                })
                .await?;

            if let Some(dealer_id) = delivery.dealer_id {
                self.storage
                    .apply_trust_delta(dealer_id, COMPLAINT_PENALTY, REASON_COMPLAINT, now)
                    .await?;
            }

            self.storage
                .append_log(
                    &NewLogEntry::new(
                        LogAction::ComplaintFiled,
                        json!({
                            "severity": analysis.severity(),
                            "category": analysis.category,
                            "priority": analysis.priority().as_str(),
                        }),
                    )
                    .user(complainant_id)
                    .delivery(delivery.id)
                    .tx(tx_hash),
                )
                .await?;

            Ok::<_, anyhow::Error>(Some(complaint_id))
        }
        .await;

        let Some(complaint_id) = chain_ahead_on_error("file complaint", tx_hash, stored)? else {
            return Err(status_changed(delivery.id));
        };
        info!(
            delivery_id = delivery.id,
            complaint_id,
            category = %analysis.category,
            "Complaint filed"
        );

        let complaint = self
            .storage
            .complaints_for_delivery(delivery.id)
            .await?
            .into_iter()
            .find(|c| c.id == complaint_id)
            .ok_or_else(|| WorkflowError::NotFound("Complaint not found".to_string()))?;

        Ok(FiledComplaint {
            complaint,
            analysis,
        })
    }

    /// Resolve a Disputed delivery and all of its pending complaints.
    pub async fn resolve_dispute(
        &self,
        delivery_id: i64,
        dealer_at_fault: bool,
        resolution: Option<String>,
    ) -> WorkflowResult<DeliveryRecord> {
        let delivery = self.require_delivery(delivery_id).await?;
        check_transition(&delivery, DeliveryStatus::Resolved)?;

        let receipt = match delivery.blockchain_delivery_id {
            Some(chain_id) => self
                .chain
                .resolve_dispute(chain_id, dealer_at_fault)
                .await
                .map_err(WorkflowError::Chain)?,
            None => None,
        };
        let tx_hash = receipt.map(|r| r.tx_hash);
        let now = Utc::now();
        let resolution = non_empty(resolution).unwrap_or_else(|| {
            if dealer_at_fault {
                "Dealer found at fault".to_string()
            } else {
                "Dealer cleared".to_string()
            }
        });

        let stored = async {
            if !self.storage.mark_resolved(delivery_id, tx_hash).await? {
                return Ok(None);
            }

            let resolved = self
                .storage
                .resolve_complaints_for_delivery(delivery_id, &resolution, dealer_at_fault, now)
                .await?;

            if dealer_at_fault {
                if let Some(dealer_id) = delivery.dealer_id {
                    self.storage.adjust_reputation(dealer_id, -1).await?;
                }
            }

            self.storage
                .append_log(
                    &NewLogEntry::new(
                        LogAction::DisputeResolved,
                        json!({
                            "dealer_at_fault": dealer_at_fault,
                            "complaints_resolved": resolved,
                            "resolution": resolution,
                        }),
                    )
                    .user(delivery.user_id)
                    .delivery(delivery_id)
                    .tx(tx_hash),
                )
                .await?;

            Ok::<_, anyhow::Error>(Some(resolved))
        }
        .await;

        let Some(resolved) = chain_ahead_on_error("resolve dispute", tx_hash, stored)? else {
            return Err(status_changed(delivery_id));
        };
        info!(delivery_id, dealer_at_fault, resolved, "Dispute resolved");

        self.require_delivery(delivery_id).await
    }

    /// Grant or revoke a dealer's authorization on the contract.
    pub async fn authorize_dealer(
        &self,
        dealer: Address,
        authorized: bool,
    ) -> WorkflowResult<Option<ChainReceipt>> {
        if dealer.is_zero() {
            return Err(WorkflowError::Invalid(
                "Dealer address must be non-zero".to_string(),
            ));
        }

        let receipt = self
            .chain
            .set_dealer_authorization(dealer, authorized)
            .await
            .map_err(WorkflowError::Chain)?;
        let tx_hash = receipt.map(|r| r.tx_hash);

        let stored = self
            .storage
            .append_log(
                &NewLogEntry::new(
                    LogAction::DealerAuthorized,
                    json!({ "dealer": dealer.to_string(), "authorized": authorized }),
                )
                .tx(tx_hash),
            )
            .await;
        chain_ahead_on_error("authorize dealer", tx_hash, stored)?;
        info!(%dealer, authorized, "Dealer authorization updated");

        Ok(receipt)
    }

    /// Record a DAO vote. Every field is required.
    pub async fn record_vote(
        &self,
        dealer_id: Option<&str>,
        vote: Option<&str>,
        voter_email: Option<&str>,
    ) -> WorkflowResult<i64> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        let (Some(dealer_id), Some(vote), Some(voter_email)) =
            (present(dealer_id), present(vote), present(voter_email))
        else {
            return Err(WorkflowError::Invalid("Missing vote data".to_string()));
        };

        let vote: Vote = vote
            .parse()
            .map_err(|e: annsuraksha_core::CoreError| WorkflowError::Invalid(e.to_string()))?;

        Ok(self
            .storage
            .insert_vote(dealer_id, vote, voter_email, Utc::now())
            .await?)
    }

    /// Deliveries of the beneficiary with `aadhar_number`, oldest first.
    ///
    /// With `verify`, each mirrored delivery is read back from the contract.
    /// A failed read leaves that entry unverified rather than failing the
    /// listing.
    pub async fn user_deliveries(
        &self,
        aadhar_number: &str,
        verify: bool,
    ) -> WorkflowResult<Vec<UserDelivery>> {
        let user = self
            .storage
            .get_user_by_aadhar(aadhar_number.trim())
            .await?
            .ok_or_else(|| WorkflowError::NotFound("User not found".to_string()))?;
        let deliveries = self.storage.deliveries_for_user(user.id).await?;
        let check_chain = verify && self.chain.is_online();

        let mut listed = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let mut entry = UserDelivery {
                delivery,
                chain_status: None,
                verified: false,
            };
            let chain_id = entry.delivery.blockchain_delivery_id.filter(|_| check_chain);
            if let Some(chain_id) = chain_id {
                match self.chain.delivery(chain_id).await {
                    Ok(on_chain) => {
                        entry.chain_status = Some(chain_status_label(on_chain.status).to_string());
                        entry.verified = true;
                    }
                    Err(e) => {
                        warn!(
                            delivery_id = entry.delivery.id,
                            chain_id, "Could not read delivery from chain: {:#}", e
                        );
                    }
                }
            }
            listed.push(entry);
        }

        debug!(user_id = user.id, count = listed.len(), verify, "Listed user deliveries");
        Ok(listed)
    }

    async fn require_user(&self, id: i64) -> WorkflowResult<UserRecord> {
        self.storage
            .get_user(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("User not found".to_string()))
    }

    async fn require_delivery(&self, id: i64) -> WorkflowResult<DeliveryRecord> {
        self.storage
            .get_delivery(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("Delivery not found".to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_transition(delivery: &DeliveryRecord, next: DeliveryStatus) -> WorkflowResult<()> {
    delivery
        .status
        .transition(next)
        .map(|_| ())
        .map_err(|e| WorkflowError::Conflict(e.to_string()))
}

fn status_changed(delivery_id: i64) -> WorkflowError {
    WorkflowError::Conflict(format!(
        "Delivery {} changed status concurrently",
        delivery_id
    ))
}

fn chain_ahead_on_error<T>(
    action: &str,
    tx_hash: Option<B256>,
    result: anyhow::Result<T>,
) -> WorkflowResult<T> {
    result.map_err(|e| {
        if let Some(tx) = tx_hash {
            error!(
                "{}: transaction 0x{} mined but database write failed: {:#}",
                action,
                hex::encode(tx),
                e
            );
        }
        WorkflowError::Storage(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainCall, OfflineMirror, RecordingMirror};
    use crate::storage::test_support::storage;
    use annsuraksha_core::ComplaintStatus;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    struct Fixture {
        workflows: Workflows,
        mirror: Arc<RecordingMirror>,
        _temp_db: NamedTempFile,
    }

    async fn fixture() -> Fixture {
        let (storage, temp_db) = storage().await;
        let mirror = Arc::new(RecordingMirror::new());
        Fixture {
            workflows: Workflows::new(storage, mirror.clone()),
            mirror,
            _temp_db: temp_db,
        }
    }

    fn register_form(email: &str, role: &str, aadhar: Option<&str>) -> RegisterUser {
        RegisterUser {
            name: "Asha".to_string(),
            email: email.to_string(),
            password: "Password@123".to_string(),
            role: role.to_string(),
            aadhar_number: aadhar.map(str::to_string),
            wallet_address: Some("0x00000000000000000000000000000000000000be".to_string()),
            phone: None,
        }
    }

    fn delivery_request(aadhar: &str) -> LogDeliveryRequest {
        LogDeliveryRequest {
            aadhar_number: aadhar.to_string(),
            dealer_id: None,
            fps_code: "FPS123456".to_string(),
            location: "19.07,72.87".to_string(),
            amount: 900,
            items: vec![],
            ipfs_hash: None,
            delivery_time: None,
            collection_time: None,
        }
    }

    async fn beneficiary(workflows: &Workflows) -> UserRecord {
        workflows
            .register_user(register_form("b@example.com", "beneficiary", Some("1111 2222 3333")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;
        assert_eq!(user.trust_score, 100);
        assert_ne!(user.password_hash, "Password@123");

        let dup = f
            .workflows
            .register_user(register_form("B@example.com", "dealer", None))
            .await;
        assert!(matches!(dup, Err(WorkflowError::Invalid(_))));

        let bad_role = f
            .workflows
            .register_user(register_form("x@example.com", "king", None))
            .await;
        assert!(matches!(bad_role, Err(WorkflowError::Invalid(_))));

        assert!(f
            .workflows
            .login("b@example.com", "Password@123")
            .await
            .unwrap()
            .is_some());
        assert!(f
            .workflows
            .login("b@example.com", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(f
            .workflows
            .login("nobody@example.com", "Password@123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_log_delivery_mirrors_and_stores() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;

        let delivery = f
            .workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.user_id, user.id);
        assert_eq!(delivery.blockchain_delivery_id, Some(0));
        assert!(delivery.tx_hash.is_some());
        assert!(matches!(f.mirror.calls()[0], ChainCall::LogDelivery(_)));

        let fps = f.workflows.storage().get_fps("FPS123456").await.unwrap().unwrap();
        assert_eq!(fps.delivery_count, 1);

        let logs = f
            .workflows
            .storage()
            .recent_logs(&[LogAction::DeliveryLogged], 5)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].delivery_id, Some(delivery.id));
    }

    #[tokio::test]
    async fn test_log_delivery_unknown_aadhar() {
        let f = fixture().await;
        let result = f.workflows.log_delivery(delivery_request("0000 0000 0000")).await;
        assert!(matches!(result, Err(WorkflowError::NotFound(_))));
        assert!(f.mirror.calls().is_empty());
    }

    #[tokio::test]
    async fn test_late_collection_penalized_at_logging() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;

        let now = Utc::now();
        let mut req = delivery_request("1111 2222 3333");
        req.delivery_time = Some(now - Duration::hours(50));
        req.collection_time = Some(now);
        f.workflows.log_delivery(req).await.unwrap();

        let user = f.workflows.storage().get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.trust_score, 90);
    }

    #[tokio::test]
    async fn test_chain_failure_aborts_before_database() {
        let f = fixture().await;
        beneficiary(&f.workflows).await;
        f.mirror.set_failing(true);

        let result = f.workflows.log_delivery(delivery_request("1111 2222 3333")).await;
        assert!(matches!(result, Err(WorkflowError::Chain(_))));
        assert_eq!(f.workflows.storage().stats().await.unwrap().delivery_count, 0);
    }

    #[tokio::test]
    async fn test_confirm_rewards_and_rejects_repeat() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;
        f.workflows
            .storage()
            .apply_trust_delta(user.id, -20, "setup", Utc::now())
            .await
            .unwrap();

        let delivery = f
            .workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();
        let confirmed = f.workflows.confirm_delivery(delivery.id).await.unwrap();
        assert_eq!(confirmed.status, DeliveryStatus::Delivered);
        assert!(confirmed.confirmation_tx_hash.is_some());

        let user = f.workflows.storage().get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.trust_score, 85);

        let again = f.workflows.confirm_delivery(delivery.id).await;
        assert!(matches!(again, Err(WorkflowError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_confirm_late_applies_penalty() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;

        let mut req = delivery_request("1111 2222 3333");
        req.delivery_time = Some(Utc::now() - Duration::hours(30));
        let delivery = f.workflows.log_delivery(req).await.unwrap();
        f.workflows.confirm_delivery(delivery.id).await.unwrap();

        let history = f.workflows.storage().trust_history(user.id).await.unwrap();
        let deltas: Vec<i32> = history.iter().map(|r| r.delta).collect();
        assert!(deltas.contains(&CONFIRMATION_REWARD));
        assert!(deltas.contains(&-10));
        let user = f.workflows.storage().get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.trust_score, 90);
    }

    #[tokio::test]
    async fn test_complaint_dispute_and_resolution() {
        let f = fixture().await;
        beneficiary(&f.workflows).await;
        let dealer = f
            .workflows
            .register_user(register_form("d@example.com", "dealer", None))
            .await
            .unwrap();

        let mut req = delivery_request("1111 2222 3333");
        req.dealer_id = Some(dealer.id);
        let delivery = f.workflows.log_delivery(req).await.unwrap();

        let filed = f
            .workflows
            .file_complaint(FileComplaintRequest {
                delivery_id: delivery.id,
                aadhar_number: None,
                text: "Delivery was extremely late".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(filed.analysis.category, "delay");
        assert_eq!(filed.complaint.status, ComplaintStatus::Pending);

        let dealer_now = f.workflows.storage().get_user(dealer.id).await.unwrap().unwrap();
        assert_eq!(dealer_now.trust_score, 90);

        let disputed = f.workflows.storage().get_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(disputed.status, DeliveryStatus::Disputed);

        let second = f
            .workflows
            .file_complaint(FileComplaintRequest {
                delivery_id: delivery.id,
                aadhar_number: Some("1111 2222 3333".to_string()),
                text: "Received less quantity".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(second.analysis.category, "shortage");
        let complaint_calls = f
            .mirror
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ChainCall::FileComplaint(..)))
            .count();
        assert_eq!(complaint_calls, 1);

        let resolved = f
            .workflows
            .resolve_dispute(delivery.id, true, None)
            .await
            .unwrap();
        assert_eq!(resolved.status, DeliveryStatus::Resolved);

        let complaints = f
            .workflows
            .storage()
            .complaints_for_delivery(delivery.id)
            .await
            .unwrap();
        assert!(complaints
            .iter()
            .all(|c| c.status == ComplaintStatus::Resolved));
        let dealer_now = f.workflows.storage().get_user(dealer.id).await.unwrap().unwrap();
        assert_eq!(dealer_now.reputation_score, -1);

        let late = f
            .workflows
            .file_complaint(FileComplaintRequest {
                delivery_id: delivery.id,
                aadhar_number: None,
                text: "again".to_string(),
            })
            .await;
        assert!(matches!(late, Err(WorkflowError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_resolve_requires_dispute() {
        let f = fixture().await;
        beneficiary(&f.workflows).await;
        let delivery = f
            .workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();

        let result = f.workflows.resolve_dispute(delivery.id, false, None).await;
        assert!(matches!(result, Err(WorkflowError::Conflict(_))));

        let missing = f.workflows.resolve_dispute(999, false, None).await;
        assert!(matches!(missing, Err(WorkflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offline_mirror_leaves_chain_fields_empty() {
        let (storage, _temp_db) = storage().await;
        let workflows = Workflows::new(storage, Arc::new(OfflineMirror));
        workflows
            .register_user(RegisterUser {
                wallet_address: None,
                ..register_form("b@example.com", "beneficiary", Some("1111 2222 3333"))
            })
            .await
            .unwrap();

        let delivery = workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();
        assert!(delivery.blockchain_delivery_id.is_none());
        assert!(delivery.tx_hash.is_none());

        let confirmed = workflows.confirm_delivery(delivery.id).await.unwrap();
        assert!(confirmed.confirmation_tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_authorize_dealer() {
        let f = fixture().await;
        let dealer = Address::repeat_byte(0x77);

        let receipt = f.workflows.authorize_dealer(dealer, true).await.unwrap();
        assert!(receipt.is_some());
        assert!(f.mirror.is_authorized(dealer));

        let zero = f.workflows.authorize_dealer(Address::ZERO, true).await;
        assert!(matches!(zero, Err(WorkflowError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_record_vote_validation() {
        let f = fixture().await;

        assert!(f
            .workflows
            .record_vote(Some("D1"), Some("yes"), Some("a@x.in"))
            .await
            .is_ok());
        let missing = f.workflows.record_vote(Some("D1"), None, Some("a@x.in")).await;
        assert!(matches!(missing, Err(WorkflowError::Invalid(ref m)) if m == "Missing vote data"));
        let bad = f
            .workflows
            .record_vote(Some("D1"), Some("maybe"), Some("a@x.in"))
            .await;
        assert!(matches!(bad, Err(WorkflowError::Invalid(_))));

        let tally = f.workflows.storage().tally("D1").await.unwrap();
        assert_eq!(tally.yes, 1);
    }

    #[tokio::test]
    async fn test_user_deliveries_with_chain_status() {
        let f = fixture().await;
        let user = beneficiary(&f.workflows).await;

        let first = f
            .workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();
        let second = f
            .workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();
        f.workflows.confirm_delivery(first.id).await.unwrap();

        // Stored with a contract id the chain never assigned.
        let mut orphan = crate::storage::deliveries::tests::new_delivery(
            user.id,
            DeliveryStatus::Pending,
        );
        orphan.blockchain_delivery_id = Some(99);
        let orphan_id = f.workflows.storage().insert_delivery(&orphan).await.unwrap();

        let listed = f
            .workflows
            .user_deliveries("1111 2222 3333", true)
            .await
            .unwrap();
        assert_eq!(listed.len(), 3);
        let find = |id: i64| listed.iter().find(|d| d.delivery.id == id).unwrap();

        assert!(find(first.id).verified);
        assert_eq!(find(first.id).chain_status.as_deref(), Some("Delivered"));
        assert!(find(second.id).verified);
        assert_eq!(find(second.id).chain_status.as_deref(), Some("Pending"));
        assert!(!find(orphan_id).verified);
        assert!(find(orphan_id).chain_status.is_none());

        let unchecked = f
            .workflows
            .user_deliveries("1111 2222 3333", false)
            .await
            .unwrap();
        assert_eq!(unchecked.len(), 3);
        assert!(unchecked.iter().all(|d| !d.verified && d.chain_status.is_none()));

        let json = serde_json::to_value(&listed[0]).unwrap();
        assert!(json.get("fps_code").is_some());
        assert!(json.get("verified").is_some());
    }

    #[tokio::test]
    async fn test_user_deliveries_offline_and_unknown_user() {
        let (storage, _temp_db) = storage().await;
        let workflows = Workflows::new(storage, Arc::new(OfflineMirror));
        workflows
            .register_user(RegisterUser {
                wallet_address: None,
                ..register_form("b@example.com", "beneficiary", Some("1111 2222 3333"))
            })
            .await
            .unwrap();
        workflows
            .log_delivery(delivery_request("1111 2222 3333"))
            .await
            .unwrap();

        let listed = workflows
            .user_deliveries(" 1111 2222 3333 ", true)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].verified);

        let missing = workflows.user_deliveries("9999 9999 9999", false).await;
        assert!(matches!(missing, Err(WorkflowError::NotFound(_))));
    }
}
