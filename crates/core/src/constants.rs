//! Canonical constants for AnnSuraksha.

/// Lowest possible trust score.
pub const MIN_TRUST_SCORE: u8 = 0;

/// Highest possible trust score.
pub const MAX_TRUST_SCORE: u8 = 100;

/// Trust score assigned at registration.
pub const INITIAL_TRUST_SCORE: u8 = 100;

/// Trust score assumed by feature aggregation when a user has none.
pub const DEFAULT_FEATURE_TRUST_SCORE: u8 = 50;

/// Reward applied to the beneficiary when a delivery is confirmed.
pub const CONFIRMATION_REWARD: i32 = 5;

/// Penalty applied to a dealer when a complaint is filed against one of their deliveries.
pub const COMPLAINT_PENALTY: i32 = -10;

/// Penalty for goods collected more than [`LATE_COLLECTION_HOURS`] after delivery.
pub const LATE_COLLECTION_PENALTY: i32 = -10;

/// Collection window after delivery before the late penalty applies.
pub const LATE_COLLECTION_HOURS: i64 = 24;

/// Users strictly below this score are scanned by the monitor.
pub const LOW_TRUST_THRESHOLD: u8 = 30;

/// Fraud probability above which the monitor raises an alert.
pub const FRAUD_PROBABILITY_THRESHOLD: f64 = 0.85;

/// Minimum hours between two alerts for the same user.
pub const ALERT_DEBOUNCE_HOURS: i64 = 24;

/// Trailing window for the `recent_deliveries` feature.
pub const RECENT_WINDOW_DAYS: i64 = 30;
