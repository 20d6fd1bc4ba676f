//! Trust-score rules.
//!
//! Scores live in `0..=100`. Every adjustment goes through [`apply_delta`],
//! so no update can leave that range.

use chrono::{DateTime, Duration, Utc};

use crate::constants::{
    LATE_COLLECTION_HOURS, LATE_COLLECTION_PENALTY, MAX_TRUST_SCORE, MIN_TRUST_SCORE,
};

/// Clamp `score + delta` to `0..=100`.
///
/// # Example
///
/// ```
/// use annsuraksha_core::trust::apply_delta;
///
/// assert_eq!(apply_delta(98, 5), 100);
/// assert_eq!(apply_delta(4, -10), 0);
/// assert_eq!(apply_delta(50, -10), 40);
/// ```
pub fn apply_delta(score: u8, delta: i32) -> u8 {
    let next = (score as i64) + (delta as i64);
    next.clamp(MIN_TRUST_SCORE as i64, MAX_TRUST_SCORE as i64) as u8
}

/// Whether collection happened more than 24 hours after delivery.
pub fn is_late_collection(delivery_time: DateTime<Utc>, collection_time: DateTime<Utc>) -> bool {
    collection_time - delivery_time > Duration::hours(LATE_COLLECTION_HOURS)
}

/// Penalty owed for a delivery's collection timing.
///
/// Returns [`LATE_COLLECTION_PENALTY`] when both times are known and the
/// collection was late, otherwise 0.
pub fn late_collection_penalty(
    delivery_time: Option<DateTime<Utc>>,
    collection_time: Option<DateTime<Utc>>,
) -> i32 {
    match (delivery_time, collection_time) {
        (Some(delivered), Some(collected)) if is_late_collection(delivered, collected) => {
            LATE_COLLECTION_PENALTY
        }
        _ => 0,
    }
}

/// Score a single delivery: 100, less the late-collection penalty.
///
/// # Example
///
/// ```
/// use annsuraksha_core::trust::compute_trust_score;
/// use chrono::{Duration, Utc};
///
/// let delivered = Utc::now();
/// assert_eq!(compute_trust_score(Some(delivered), Some(delivered + Duration::hours(30))), 90);
/// assert_eq!(compute_trust_score(Some(delivered), Some(delivered + Duration::hours(2))), 100);
/// assert_eq!(compute_trust_score(Some(delivered), None), 100);
/// ```
pub fn compute_trust_score(
    delivery_time: Option<DateTime<Utc>>,
    collection_time: Option<DateTime<Utc>>,
) -> u8 {
    apply_delta(
        MAX_TRUST_SCORE,
        late_collection_penalty(delivery_time, collection_time),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COMPLAINT_PENALTY, CONFIRMATION_REWARD};

    #[test]
    fn test_apply_delta_clamps_extremes() {
        assert_eq!(apply_delta(0, i32::MIN), 0);
        assert_eq!(apply_delta(100, i32::MAX), 100);
        assert_eq!(apply_delta(50, 0), 50);
        for score in [0u8, 1, 29, 30, 99, 100] {
            for delta in [-1000, -10, -1, 0, 1, 5, 1000] {
                let next = apply_delta(score, delta);
                assert!(next <= 100, "score {} delta {} -> {}", score, delta, next);
            }
        }
    }

    #[test]
    fn test_reward_and_penalty_constants() {
        assert_eq!(apply_delta(100, CONFIRMATION_REWARD), 100);
        assert_eq!(apply_delta(60, CONFIRMATION_REWARD), 65);
        assert_eq!(apply_delta(60, COMPLAINT_PENALTY), 50);
    }

    #[test]
    fn test_late_collection_boundary() {
        let delivered = Utc::now();
        let exactly = delivered + Duration::hours(24);
        let over = exactly + Duration::seconds(1);

        assert!(!is_late_collection(delivered, exactly));
        assert!(is_late_collection(delivered, over));
        assert_eq!(compute_trust_score(Some(delivered), Some(exactly)), 100);
        assert_eq!(compute_trust_score(Some(delivered), Some(over)), 90);
    }

    #[test]
    fn test_missing_times_incur_no_penalty() {
        let t = Utc::now();
        assert_eq!(late_collection_penalty(None, Some(t)), 0);
        assert_eq!(late_collection_penalty(Some(t), None), 0);
        assert_eq!(compute_trust_score(None, None), 100);
    }
}
