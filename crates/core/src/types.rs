//! Core types for AnnSuraksha.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{INITIAL_TRUST_SCORE, MAX_TRUST_SCORE};
use crate::error::CoreError;

/// Role of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Receives subsidized goods.
    Beneficiary,
    /// Runs a Fair Price Shop and hands out goods.
    Dealer,
    /// Resolves disputes and authorizes dealers.
    Admin,
}

impl Role {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Beneficiary => "beneficiary",
            Role::Dealer => "dealer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beneficiary" => Ok(Role::Beneficiary),
            "dealer" => Ok(Role::Dealer),
            "admin" => Ok(Role::Admin),
            _ => Err(CoreError::InvalidRole(s.to_string())),
        }
    }
}

/// Lifecycle state of a delivery.
///
/// Allowed transitions:
/// - `Pending -> Delivered`
/// - `Pending | Delivered -> Disputed`
/// - `Disputed -> Resolved`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Logged by the dealer, not yet collected.
    Pending,
    /// Collection confirmed by the beneficiary.
    Delivered,
    /// A complaint was filed.
    Disputed,
    /// An admin resolved the dispute.
    Resolved,
}

impl DeliveryStatus {
    /// All statuses in chain code order.
    pub const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Delivered,
        DeliveryStatus::Disputed,
        DeliveryStatus::Resolved,
    ];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Disputed => "Disputed",
            DeliveryStatus::Resolved => "Resolved",
        }
    }

    /// Whether `self -> next` is a permitted transition.
    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::Pending, DeliveryStatus::Delivered)
                | (DeliveryStatus::Pending, DeliveryStatus::Disputed)
                | (DeliveryStatus::Delivered, DeliveryStatus::Disputed)
                | (DeliveryStatus::Disputed, DeliveryStatus::Resolved)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: DeliveryStatus) -> Result<DeliveryStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Map the contract's `uint8` status code. Codes above 3 are unknown.
    pub fn from_chain_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Contract status code for this status.
    pub fn chain_code(&self) -> u8 {
        *self as u8
    }
}

/// Human label for a contract status code (`"Unknown"` outside 0..=3).
pub fn chain_status_label(code: u8) -> &'static str {
    DeliveryStatus::from_chain_code(code)
        .map(|s| s.as_str())
        .unwrap_or("Unknown")
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(DeliveryStatus::Pending),
            "Delivered" => Ok(DeliveryStatus::Delivered),
            "Disputed" => Ok(DeliveryStatus::Disputed),
            "Resolved" => Ok(DeliveryStatus::Resolved),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// State of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    /// Awaiting admin action.
    Pending,
    /// Closed together with its delivery's dispute.
    Resolved,
}

impl ComplaintStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "Pending",
            ComplaintStatus::Resolved => "Resolved",
        }
    }
}

impl FromStr for ComplaintStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ComplaintStatus::Pending),
            "Resolved" => Ok(ComplaintStatus::Resolved),
            _ => Err(CoreError::InvalidComplaintStatus(s.to_string())),
        }
    }
}

/// Trust score ranging from 0 to 100.
///
/// Validated on construction and deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrustScore(u8);

impl TrustScore {
    /// Create a new TrustScore, validating the range.
    pub fn new(value: i64) -> Result<Self, CoreError> {
        if !(0..=MAX_TRUST_SCORE as i64).contains(&value) {
            return Err(CoreError::InvalidTrustScore(value));
        }
        Ok(TrustScore(value as u8))
    }

    /// Score assigned at registration.
    pub const fn initial() -> Self {
        TrustScore(INITIAL_TRUST_SCORE)
    }

    /// Get the raw value.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Apply a signed adjustment, clamping to 0..=100.
    pub fn adjusted(&self, delta: i32) -> Self {
        TrustScore(crate::trust::apply_delta(self.0, delta))
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TrustScore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrustScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        TrustScore::new(value).map_err(|e| serde::de::Error::custom(format!("{}", e)))
    }
}

/// One line item of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryItem {
    /// Commodity name (e.g. "Rice").
    pub name: String,
    /// Quantity in `unit`.
    pub quantity: f64,
    /// Unit of measure (e.g. "kg").
    #[serde(default)]
    pub unit: String,
}

/// Action recorded in the append-only blockchain log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    /// A delivery was logged on chain.
    DeliveryLogged,
    /// A beneficiary confirmed collection.
    DeliveryConfirmed,
    /// A complaint was filed against a delivery.
    ComplaintFiled,
    /// An admin resolved a dispute.
    DisputeResolved,
    /// A dealer's authorization was changed.
    DealerAuthorized,
    /// The monitor raised an alert.
    AiAlert,
}

impl LogAction {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::DeliveryLogged => "DELIVERY_LOGGED",
            LogAction::DeliveryConfirmed => "DELIVERY_CONFIRMED",
            LogAction::ComplaintFiled => "COMPLAINT_FILED",
            LogAction::DisputeResolved => "DISPUTE_RESOLVED",
            LogAction::DealerAuthorized => "DEALER_AUTHORIZED",
            LogAction::AiAlert => "AI_ALERT",
        }
    }
}

impl FromStr for LogAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELIVERY_LOGGED" => Ok(LogAction::DeliveryLogged),
            "DELIVERY_CONFIRMED" => Ok(LogAction::DeliveryConfirmed),
            "COMPLAINT_FILED" => Ok(LogAction::ComplaintFiled),
            "DISPUTE_RESOLVED" => Ok(LogAction::DisputeResolved),
            "DEALER_AUTHORIZED" => Ok(LogAction::DealerAuthorized),
            "AI_ALERT" => Ok(LogAction::AiAlert),
            _ => Err(format!("Unknown log action: {}", s)),
        }
    }
}

/// Kind of alert raised by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Low-trust user flagged by the anomaly model.
    LowTrust,
    /// Pending delivery flagged by the fraud model.
    PotentialFraud,
}

impl AlertKind {
    /// Convert to payload string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowTrust => "LOW_TRUST",
            AlertKind::PotentialFraud => "POTENTIAL_FRAUD",
        }
    }
}

/// DAO vote on a dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    /// In favor.
    Yes,
    /// Against.
    No,
}

impl Vote {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Yes => "yes",
            Vote::No => "no",
        }
    }
}

impl FromStr for Vote {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Vote::Yes),
            "no" => Ok(Vote::No),
            _ => Err(CoreError::InvalidVote(s.to_string())),
        }
    }
}

/// Parse a `"lat,lon"` location string.
///
/// Returns `None` unless both halves parse as finite numbers.
pub fn parse_location(location: &str) -> Option<(f64, f64)> {
    let (lat, lon) = location.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if lat.is_finite() && lon.is_finite() {
        Some((lat, lon))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("dealer".parse::<Role>().unwrap(), Role::Dealer);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Beneficiary.as_str(), "beneficiary");
        assert!(matches!(
            "auditor".parse::<Role>(),
            Err(CoreError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_status_transitions() {
        use DeliveryStatus::*;

        assert!(Pending.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Disputed));
        assert!(Delivered.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Resolved));

        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(Disputed));
        assert!(!Pending.can_transition_to(Resolved));
        assert!(!Delivered.can_transition_to(Delivered));

        assert_eq!(
            Resolved.transition(Delivered),
            Err(CoreError::InvalidTransition {
                from: Resolved,
                to: Delivered
            })
        );
    }

    #[test]
    fn test_chain_status_mapping() {
        assert_eq!(
            DeliveryStatus::from_chain_code(0),
            Some(DeliveryStatus::Pending)
        );
        assert_eq!(
            DeliveryStatus::from_chain_code(3),
            Some(DeliveryStatus::Resolved)
        );
        assert_eq!(DeliveryStatus::from_chain_code(4), None);
        assert_eq!(chain_status_label(2), "Disputed");
        assert_eq!(chain_status_label(9), "Unknown");
        assert_eq!(DeliveryStatus::Delivered.chain_code(), 1);
    }

    #[test]
    fn test_trust_score_validation() {
        assert!(TrustScore::new(0).is_ok());
        assert!(TrustScore::new(100).is_ok());
        assert!(TrustScore::new(101).is_err());
        assert!(TrustScore::new(-1).is_err());
        assert_eq!(TrustScore::default().value(), 100);
        assert_eq!(TrustScore::initial().adjusted(25).value(), 100);
    }

    #[test]
    fn test_trust_score_deserialization_validates() {
        let ok: TrustScore = serde_json::from_str("42").unwrap();
        assert_eq!(ok.value(), 42);
        assert!(serde_json::from_str::<TrustScore>("150").is_err());
    }

    #[test]
    fn test_log_action_round_trip() {
        for action in [
            LogAction::DeliveryLogged,
            LogAction::ComplaintFiled,
            LogAction::AiAlert,
        ] {
            assert_eq!(action.as_str().parse::<LogAction>().unwrap(), action);
        }
        assert_eq!(
            serde_json::to_string(&LogAction::AiAlert).unwrap(),
            "\"AI_ALERT\""
        );
    }

    #[test]
    fn test_vote_parsing() {
        assert_eq!("YES".parse::<Vote>().unwrap(), Vote::Yes);
        assert_eq!("no".parse::<Vote>().unwrap(), Vote::No);
        assert!("maybe".parse::<Vote>().is_err());
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location("28.61, 77.20"), Some((28.61, 77.20)));
        assert_eq!(parse_location("Delhi"), None);
        assert_eq!(parse_location("12.0,abc"), None);
    }
}
