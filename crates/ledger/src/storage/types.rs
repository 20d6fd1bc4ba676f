//! Database types for the ledger storage layer.

use alloy::primitives::{Address, B256};
use annsuraksha_core::{ComplaintStatus, DeliveryItem, DeliveryStatus, LogAction, Priority, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered user as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email (unique).
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role.
    pub role: Role,
    /// Trust score (0-100).
    pub trust_score: u8,
    /// Aadhar number (unique when present).
    pub aadhar_number: Option<String>,
    /// Wallet used for chain calls on this user's behalf.
    pub wallet_address: Option<Address>,
    /// Phone number.
    pub phone: Option<String>,
    /// Dealer reputation; decremented when found at fault.
    pub reputation_score: i64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login: Option<DateTime<Utc>>,
    /// Last monitor alert for this user.
    pub last_alert: Option<DateTime<Utc>>,
}

/// Insert payload for [`UserRecord`].
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Role.
    pub role: Role,
    /// Initial trust score.
    pub trust_score: u8,
    /// Aadhar number.
    pub aadhar_number: Option<String>,
    /// Wallet address.
    pub wallet_address: Option<Address>,
    /// Phone number.
    pub phone: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// A delivery as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRecord {
    /// Row id.
    pub id: i64,
    /// Beneficiary.
    pub user_id: i64,
    /// Dealer, when known.
    pub dealer_id: Option<i64>,
    /// Fair Price Shop code.
    pub fps_code: String,
    /// `"lat,lon"` text.
    pub location: String,
    /// Amount in rupees.
    pub amount: i64,
    /// Line items.
    pub items: Vec<DeliveryItem>,
    /// Evidence pinned to IPFS.
    pub ipfs_hash: Option<String>,
    /// Lifecycle status.
    pub status: DeliveryStatus,
    /// When goods were handed to the shop.
    pub delivery_time: DateTime<Utc>,
    /// When the beneficiary collected.
    pub collection_time: Option<DateTime<Utc>>,
    /// When a complaint disputed the delivery.
    pub dispute_time: Option<DateTime<Utc>>,
    /// Contract-side delivery id.
    pub blockchain_delivery_id: Option<u64>,
    /// `logDelivery` transaction.
    pub tx_hash: Option<B256>,
    /// `confirmDelivery` transaction.
    pub confirmation_tx_hash: Option<B256>,
    /// `fileComplaint` transaction.
    pub dispute_tx_hash: Option<B256>,
    /// `resolveDispute` transaction.
    pub resolution_tx_hash: Option<B256>,
    /// Whether the monitor has scored this delivery.
    pub fraud_checked: bool,
    /// Monitor fraud probability.
    pub fraud_probability: Option<f64>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`DeliveryRecord`].
#[derive(Debug, Clone)]
pub struct NewDelivery {
    /// Beneficiary.
    pub user_id: i64,
    /// Dealer.
    pub dealer_id: Option<i64>,
    /// Fair Price Shop code.
    pub fps_code: String,
    /// `"lat,lon"` text.
    pub location: String,
    /// Amount in rupees.
    pub amount: i64,
    /// Line items.
    pub items: Vec<DeliveryItem>,
    /// IPFS evidence hash.
    pub ipfs_hash: Option<String>,
    /// Initial status.
    pub status: DeliveryStatus,
    /// Delivery time.
    pub delivery_time: DateTime<Utc>,
    /// Collection time.
    pub collection_time: Option<DateTime<Utc>>,
    /// Dispute time.
    pub dispute_time: Option<DateTime<Utc>>,
    /// Contract-side delivery id.
    pub blockchain_delivery_id: Option<u64>,
    /// `logDelivery` transaction.
    pub tx_hash: Option<B256>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// A complaint as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplaintRecord {
    /// Row id.
    pub id: i64,
    /// Disputed delivery.
    pub delivery_id: i64,
    /// Complainant.
    pub user_id: i64,
    /// Free text.
    pub text: String,
    /// Analyzed category.
    pub category: String,
    /// Analyzed severity (0-1).
    pub severity: f64,
    /// Handling priority.
    pub priority: Priority,
    /// Status.
    pub status: ComplaintStatus,
    /// Resolution note.
    pub resolution: Option<String>,
    /// Whether the dealer was found at fault.
    pub dealer_at_fault: Option<bool>,
    /// Resolution time.
    pub resolution_time: Option<DateTime<Utc>>,
    /// `fileComplaint` transaction.
    pub tx_hash: Option<B256>,
    /// Filing time.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`ComplaintRecord`].
#[derive(Debug, Clone)]
pub struct NewComplaint {
    /// Disputed delivery.
    pub delivery_id: i64,
    /// Complainant.
    pub user_id: i64,
    /// Free text.
    pub text: String,
    /// Analyzed category.
    pub category: String,
    /// Analyzed severity.
    pub severity: f64,
    /// Priority.
    pub priority: Priority,
    /// `fileComplaint` transaction.
    pub tx_hash: Option<B256>,
    /// Filing time.
    pub created_at: DateTime<Utc>,
}

/// Complaint joined with the complainant's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveComplaint {
    /// Complainant name, `"Unknown"` if the user row is gone.
    pub user_name: String,
    /// Complaint text.
    pub issue: String,
    /// Severity.
    pub severity: f64,
    /// Priority.
    pub priority: Priority,
    /// Status.
    pub status: ComplaintStatus,
    /// Filing time.
    pub created_at: DateTime<Utc>,
}

/// Append-only trust-score change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustScoreRecord {
    /// Row id.
    pub id: i64,
    /// Affected user.
    pub user_id: i64,
    /// Score before.
    pub old_score: u8,
    /// Score after (clamped).
    pub new_score: u8,
    /// Requested delta.
    pub delta: i32,
    /// Why the score changed.
    pub reason: String,
    /// When it changed.
    pub created_at: DateTime<Utc>,
}

/// Append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockchainLogRecord {
    /// Row id.
    pub id: i64,
    /// Action.
    pub action: LogAction,
    /// Related user.
    pub user_id: Option<i64>,
    /// Related delivery.
    pub delivery_id: Option<i64>,
    /// Related transaction.
    pub tx_hash: Option<B256>,
    /// Action-specific details.
    pub payload: serde_json::Value,
    /// When it was written.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`BlockchainLogRecord`].
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    /// Action.
    pub action: LogAction,
    /// Related user.
    pub user_id: Option<i64>,
    /// Related delivery.
    pub delivery_id: Option<i64>,
    /// Related transaction.
    pub tx_hash: Option<B256>,
    /// Action-specific details.
    pub payload: serde_json::Value,
    /// When it was written.
    pub created_at: DateTime<Utc>,
}

impl NewLogEntry {
    /// Entry stamped now with an empty reference set.
    pub fn new(action: LogAction, payload: serde_json::Value) -> Self {
        Self {
            action,
            user_id: None,
            delivery_id: None,
            tx_hash: None,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Attach a user.
    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach a delivery.
    pub fn delivery(mut self, delivery_id: i64) -> Self {
        self.delivery_id = Some(delivery_id);
        self
    }

    /// Attach a transaction hash.
    pub fn tx(mut self, tx_hash: Option<B256>) -> Self {
        self.tx_hash = tx_hash;
        self
    }
}

/// A Fair Price Shop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FpsRecord {
    /// Row id.
    pub id: i64,
    /// Shop code (unique).
    pub fps_code: String,
    /// Shop name.
    pub name: String,
    /// Owning dealer.
    pub dealer_id: Option<i64>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Deliveries logged against the shop.
    pub delivery_count: i64,
    /// Latest delivery time.
    pub last_delivery: Option<DateTime<Utc>>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`FpsRecord`].
#[derive(Debug, Clone)]
pub struct NewFps {
    /// Shop code.
    pub fps_code: String,
    /// Shop name.
    pub name: String,
    /// Owning dealer.
    pub dealer_id: Option<i64>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Yes/no tally for one dealer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DaoTally {
    /// Yes votes.
    pub yes: i64,
    /// No votes.
    pub no: i64,
}

/// Trust score summary across all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrustOverview {
    /// Mean score rounded to 2 decimals.
    pub average: f64,
    /// Lowest score.
    pub min: i64,
    /// Highest score.
    pub max: i64,
    /// Users counted.
    pub count: i64,
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    /// Beneficiary accounts.
    pub total_beneficiaries: i64,
    /// All deliveries.
    pub total_deliveries: i64,
    /// Pending deliveries.
    pub pending_deliveries: i64,
    /// Delivered deliveries.
    pub delivered_deliveries: i64,
    /// Disputed deliveries.
    pub disputed_deliveries: i64,
    /// Resolved deliveries.
    pub resolved_deliveries: i64,
    /// All complaints.
    pub total_complaints: i64,
    /// Mean user trust score, 0 with no users.
    pub avg_trust_score: f64,
    /// When these numbers were computed.
    pub last_updated: DateTime<Utc>,
}

/// Kind of a [`TimelineEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineKind {
    /// A logged delivery.
    Delivery,
    /// A filed complaint.
    Complaint,
}

/// Merged delivery/complaint activity entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    /// Kind.
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    /// Subject user.
    pub user_id: i64,
    /// Subject user's aadhar number, when registered.
    pub aadhar_number: Option<String>,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Short description.
    pub details: String,
}

/// Result of a trust-score adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustChange {
    /// Score before.
    pub old_score: u8,
    /// Score after.
    pub new_score: u8,
}
