//! Error types for the scoring crate.

use thiserror::Error;

/// Scoring error type.
#[derive(Error, Debug)]
pub enum ScoringError {
    /// No rows to fit on.
    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    /// Row width does not match the fitted width.
    #[error("Feature width mismatch: expected {expected}, got {actual}")]
    WidthMismatch {
        /// Fitted width.
        expected: usize,
        /// Supplied width.
        actual: usize,
    },

    /// The underlying estimator failed.
    #[error("Estimator error: {0}")]
    Estimator(String),

    /// Snapshot I/O failed.
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failed.
    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type alias for ScoringError.
pub type Result<T> = std::result::Result<T, ScoringError>;
