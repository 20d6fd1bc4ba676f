//! Timestamp normalization.
//!
//! Timestamps arrive as RFC 3339 strings, naive `YYYY-MM-DD[T ]HH:MM:SS`
//! strings or unix seconds. Naive values are read as UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{CoreError, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp string into UTC.
///
/// # Example
///
/// ```
/// use annsuraksha_core::time::parse_timestamp;
///
/// let a = parse_timestamp("2024-03-01T10:00:00").unwrap();
/// let b = parse_timestamp("2024-03-01T15:30:00+05:30").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return from_unix(secs);
    }

    Err(CoreError::InvalidTimestamp(input.to_string()))
}

/// Convert unix seconds to UTC.
pub fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(CoreError::InvalidTimestamp(secs.to_string()))
}

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}
