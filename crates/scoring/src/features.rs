//! Behavioral feature aggregation.
//!
//! Trust vectors (7 columns, in order):
//! total deliveries, total complaints, complaint ratio, average amount,
//! deliveries in the trailing 30 days, std of delivery hour, trust score.
//!
//! Delivery vectors (5 columns, in order):
//! amount, item count, delivery hour (UTC), latitude, longitude.

use annsuraksha_core::{parse_location, DEFAULT_FEATURE_TRUST_SCORE, RECENT_WINDOW_DAYS};
use chrono::{DateTime, Duration, Timelike, Utc};

/// Width of a user behavior vector.
pub const TRUST_FEATURES: usize = 7;

/// Width of a delivery vector.
pub const DELIVERY_FEATURES: usize = 5;

/// User behavior vector.
pub type TrustRow = [f64; TRUST_FEATURES];

/// Delivery vector.
pub type DeliveryRow = [f64; DELIVERY_FEATURES];

/// The parts of a delivery the estimators look at.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverySample {
    /// Amount in rupees.
    pub amount: f64,
    /// Number of line items.
    pub item_count: usize,
    /// When the delivery was logged (UTC).
    pub delivery_time: DateTime<Utc>,
    /// `"lat,lon"` text.
    pub location: String,
}

/// Aggregate a user's history into a [`TrustRow`].
pub fn user_features(
    trust_score: Option<u8>,
    deliveries: &[DeliverySample],
    complaint_count: usize,
    now: DateTime<Utc>,
) -> TrustRow {
    let total = deliveries.len() as f64;
    let complaints = complaint_count as f64;

    let complaint_ratio = if deliveries.is_empty() {
        0.0
    } else {
        complaints / total
    };

    let avg_amount = if deliveries.is_empty() {
        0.0
    } else {
        deliveries.iter().map(|d| d.amount).sum::<f64>() / total
    };

    let window_start = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent = deliveries
        .iter()
        .filter(|d| d.delivery_time > window_start)
        .count() as f64;

    let hours: Vec<f64> = deliveries
        .iter()
        .map(|d| d.delivery_time.hour() as f64)
        .collect();

    [
        total,
        complaints,
        complaint_ratio,
        avg_amount,
        recent,
        population_std(&hours),
        trust_score.unwrap_or(DEFAULT_FEATURE_TRUST_SCORE) as f64,
    ]
}

/// Project a single delivery onto a [`DeliveryRow`].
///
/// An unparseable location maps to `(0, 0)`.
pub fn delivery_features(delivery: &DeliverySample) -> DeliveryRow {
    let (lat, lon) = parse_location(&delivery.location).unwrap_or((0.0, 0.0));
    [
        delivery.amount,
        delivery.item_count as f64,
        delivery.delivery_time.hour() as f64,
        lat,
        lon,
    ]
}

/// Population standard deviation, 0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(amount: f64, at: DateTime<Utc>) -> DeliverySample {
        DeliverySample {
            amount,
            item_count: 2,
            delivery_time: at,
            location: "28.6,77.2".to_string(),
        }
    }

    #[test]
    fn test_empty_history() {
        let now = Utc::now();
        let row = user_features(None, &[], 3, now);
        assert_eq!(row, [0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 50.0]);
    }

    #[test]
    fn test_aggregates() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let deliveries = vec![
            sample(100.0, Utc.with_ymd_and_hms(2024, 6, 29, 10, 0, 0).unwrap()),
            sample(300.0, Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap()),
            sample(200.0, Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap()),
            sample(400.0, Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()),
        ];

        let row = user_features(Some(80), &deliveries, 1, now);
        assert_eq!(row[0], 4.0);
        assert_eq!(row[1], 1.0);
        assert_eq!(row[2], 0.25);
        assert_eq!(row[3], 250.0);
        assert_eq!(row[4], 2.0);
        assert_eq!(row[5], 2.0);
        assert_eq!(row[6], 80.0);
    }

    #[test]
    fn test_delivery_features() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        let row = delivery_features(&sample(150.0, at));
        assert_eq!(row, [150.0, 2.0, 9.0, 28.6, 77.2]);

        let mut bad = sample(10.0, at);
        bad.location = "unknown".to_string();
        let row = delivery_features(&bad);
        assert_eq!(row[3], 0.0);
        assert_eq!(row[4], 0.0);
    }

    #[test]
    fn test_population_std() {
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(population_std(&[5.0, 5.0]), 0.0);
        assert_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
    }
}
