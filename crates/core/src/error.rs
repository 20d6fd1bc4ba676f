//! Error types for the core crate.

use thiserror::Error;

use crate::types::DeliveryStatus;

/// Core error type.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// Unknown user role.
    #[error("Invalid role: {0} (must be beneficiary, dealer or admin)")]
    InvalidRole(String),

    /// Unknown delivery status.
    #[error("Invalid delivery status: {0}")]
    InvalidStatus(String),

    /// Unknown complaint status.
    #[error("Invalid complaint status: {0}")]
    InvalidComplaintStatus(String),

    /// Delivery status transition not permitted.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: DeliveryStatus,
        /// Requested status.
        to: DeliveryStatus,
    },

    /// Trust score outside 0..=100.
    #[error("Invalid trust score: {0} (must be between 0 and 100)")]
    InvalidTrustScore(i64),

    /// Unparseable timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Unknown DAO vote value.
    #[error("Invalid vote: {0} (must be yes or no)")]
    InvalidVote(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
