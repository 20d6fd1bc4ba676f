//! # AnnSuraksha Core
//!
//! Domain types and pure business rules shared by every AnnSuraksha component.
//!
//! ## Features
//!
//! - **Domain Types**: Role, DeliveryStatus, User, Delivery, Complaint, TrustScoreRecord
//! - **Constants**: Trust-score bounds, rewards and penalties, monitor thresholds
//! - **Trust Rules**: Late-collection penalty and clamped score adjustment
//! - **Complaint Analysis**: Keyword classification of free-text complaints
//! - **Time**: Normalization of naive and offset timestamps to UTC

#![warn(missing_docs)]

pub mod complaint;
pub mod constants;
pub mod error;
pub mod time;
pub mod trust;
pub mod types;

// Re-export commonly used items
pub use complaint::{analyze_complaint_text, ComplaintAnalysis, Priority};
pub use constants::*;
pub use error::{CoreError, Result};
pub use trust::{apply_delta, compute_trust_score, late_collection_penalty};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, B256};
