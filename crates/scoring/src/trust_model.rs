//! Trust-anomaly model over standardized behavior vectors.

use extended_isolation_forest::{Forest, ForestOptions};

use crate::error::{Result, ScoringError};
use crate::features::{TrustRow, TRUST_FEATURES};
use crate::ModelParams;

const MAX_SAMPLE_SIZE: usize = 256;

/// Isolation forest plus the decision threshold derived from its training scores.
pub struct TrustAnomalyModel {
    forest: Forest<f64, TRUST_FEATURES>,
    threshold: f64,
}

impl TrustAnomalyModel {
    /// Fit on already-standardized rows.
    ///
    /// The threshold is the training-score quantile at `1 - contamination`,
    /// so roughly `contamination` of the training set scores above it.
    pub fn fit(rows: &[TrustRow], params: &ModelParams) -> Result<Self> {
        if rows.is_empty() {
            return Err(ScoringError::EmptyTrainingSet);
        }

        let options = ForestOptions {
            n_trees: params.n_trees,
            sample_size: rows.len().min(MAX_SAMPLE_SIZE),
            max_tree_depth: None,
            extension_level: 0,
        };
        let forest = Forest::from_slice(rows, &options)
            .map_err(|e| ScoringError::Estimator(e.to_string()))?;

        let mut scores: Vec<f64> = rows.iter().map(|row| forest.score(row)).collect();
        let threshold = quantile(&mut scores, 1.0 - params.contamination);

        Ok(Self { forest, threshold })
    }

    /// Anomaly score in `[0, 1]`; higher is more anomalous.
    pub fn score(&self, row: &TrustRow) -> f64 {
        self.forest.score(row)
    }

    /// Whether `row` scores above the contamination threshold.
    pub fn is_anomalous(&self, row: &TrustRow) -> bool {
        self.score(row) > self.threshold
    }

    /// Decision threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Linear-interpolated quantile; sorts `values` in place.
fn quantile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}
