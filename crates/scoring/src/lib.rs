//! # AnnSuraksha Scoring
//!
//! Behavioral features and the two unsupervised estimators the monitor
//! runs against them:
//!
//! - **Trust anomaly**: isolation forest over standardized 7-column user vectors
//! - **Delivery fraud**: DBSCAN over a user's standardized 5-column delivery history
//!
//! [`Models`] wraps both behind a facade that degrades to "no anomaly" when
//! nothing has been fitted yet.

#![warn(missing_docs)]

pub mod error;
pub mod features;
pub mod fraud_model;
pub mod snapshot;
pub mod standardize;
pub mod trust_model;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

pub use error::{Result, ScoringError};
pub use features::{
    delivery_features, user_features, DeliveryRow, DeliverySample, TrustRow, DELIVERY_FEATURES,
    TRUST_FEATURES,
};
pub use fraud_model::FraudModel;
pub use snapshot::{ModelSnapshot, SNAPSHOT_FILE};
pub use standardize::Standardizer;
pub use trust_model::TrustAnomalyModel;

/// Baseline trust rows used when there is no real history.
pub const BASELINE_TRUST_ROWS: usize = 50;

/// Baseline delivery rows used when there is not enough real history.
pub const BASELINE_DELIVERY_ROWS: usize = 100;

/// Real delivery rows required before the fraud scaler is fitted on them.
pub const MIN_REAL_DELIVERY_ROWS: usize = 10;

fn default_contamination() -> f64 {
    0.1
}

fn default_n_trees() -> usize {
    100
}

fn default_dbscan_eps() -> f64 {
    0.5
}

fn default_dbscan_min_samples() -> usize {
    5
}

/// Estimator hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Expected share of anomalous users.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    /// Trees in the isolation forest.
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// DBSCAN neighborhood radius.
    #[serde(default = "default_dbscan_eps")]
    pub dbscan_eps: f64,
    /// DBSCAN core-point size.
    #[serde(default = "default_dbscan_min_samples")]
    pub dbscan_min_samples: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            n_trees: default_n_trees(),
            dbscan_eps: default_dbscan_eps(),
            dbscan_min_samples: default_dbscan_min_samples(),
        }
    }
}

struct Fitted {
    snapshot: ModelSnapshot,
    trust_model: TrustAnomalyModel,
}

/// Trust-anomaly and delivery-fraud estimators.
pub struct Models {
    params: ModelParams,
    fraud_model: FraudModel,
    fitted: Option<Fitted>,
}

impl Models {
    /// Unfitted models.
    pub fn new(params: ModelParams) -> Self {
        Self {
            params,
            fraud_model: FraudModel::new(params.dbscan_eps, params.dbscan_min_samples),
            fitted: None,
        }
    }

    /// Fit on raw (unstandardized) rows.
    ///
    /// With no trust rows both scalers and the forest are fitted on uniform
    /// random baseline data. The fraud scaler uses real delivery rows only
    /// when there are more than [`MIN_REAL_DELIVERY_ROWS`] of them.
    pub fn train<R: Rng>(
        params: ModelParams,
        trust_rows: &[TrustRow],
        delivery_rows: &[DeliveryRow],
        rng: &mut R,
    ) -> Result<Self> {
        let baseline = trust_rows.is_empty();

        let trust_rows: Vec<TrustRow> = if baseline {
            info!(
                "No behavior history; fitting baseline on {} random rows",
                BASELINE_TRUST_ROWS
            );
            random_rows(BASELINE_TRUST_ROWS, rng)
        } else {
            trust_rows.to_vec()
        };

        let delivery_rows: Vec<DeliveryRow> = if baseline || delivery_rows.len() <= MIN_REAL_DELIVERY_ROWS
        {
            debug!(
                real = delivery_rows.len(),
                "Fitting fraud scaler on baseline rows"
            );
            random_rows(BASELINE_DELIVERY_ROWS, rng)
        } else {
            delivery_rows.to_vec()
        };

        let trust_scaler = Standardizer::fit(&trust_rows)?;
        let fraud_scaler = Standardizer::fit(&delivery_rows)?;
        let standardized = trust_scaler.transform_all(&trust_rows)?;

        let snapshot = ModelSnapshot {
            version: snapshot::SNAPSHOT_VERSION,
            trained_at: Utc::now(),
            baseline,
            trust_scaler,
            fraud_scaler,
            trust_rows: standardized,
        };

        Self::from_snapshot(params, snapshot)
    }

    /// Rebuild fitted models from a snapshot, refitting the forest.
    pub fn from_snapshot(params: ModelParams, snapshot: ModelSnapshot) -> Result<Self> {
        let trust_model = TrustAnomalyModel::fit(&snapshot.trust_rows, &params)?;
        info!(
            rows = snapshot.trust_rows.len(),
            threshold = trust_model.threshold(),
            baseline = snapshot.baseline,
            "Trust anomaly model fitted"
        );

        let mut models = Self::new(params);
        models.fitted = Some(Fitted {
            snapshot,
            trust_model,
        });
        Ok(models)
    }

    /// Load `<dir>/models.json`.
    ///
    /// A missing or unreadable snapshot yields unfitted models.
    pub fn load(params: ModelParams, dir: &Path) -> Self {
        let snapshot = match ModelSnapshot::load(dir) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                info!("No usable model snapshot in {}: {}", dir.display(), e);
                return Self::new(params);
            }
        };

        match Self::from_snapshot(params, snapshot) {
            Ok(models) => models,
            Err(e) => {
                warn!("Failed to rebuild models from snapshot: {}", e);
                Self::new(params)
            }
        }
    }

    /// Persist to `<dir>/models.json`. Does nothing when unfitted.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if let Some(fitted) = &self.fitted {
            let path = fitted.snapshot.save(dir)?;
            info!("Saved model snapshot to {}", path.display());
        }
        Ok(())
    }

    /// Whether [`Models::train`] or a snapshot load succeeded.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Current snapshot, if fitted.
    pub fn snapshot(&self) -> Option<&ModelSnapshot> {
        self.fitted.as_ref().map(|f| &f.snapshot)
    }

    /// Hyperparameters.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Whether a raw behavior vector is anomalous. `false` when unfitted.
    pub fn detect_trust_anomaly(&self, row: &TrustRow) -> bool {
        let Some(fitted) = &self.fitted else {
            return false;
        };
        match fitted.snapshot.trust_scaler.transform(row) {
            Ok(scaled) => fitted.trust_model.is_anomalous(&scaled),
            Err(e) => {
                warn!("Trust anomaly detection failed: {}", e);
                false
            }
        }
    }

    /// Fraud probability of a raw candidate given raw history. `0.0` when unfitted.
    pub fn fraud_probability(&self, history: &[DeliveryRow], candidate: &DeliveryRow) -> f64 {
        let Some(fitted) = &self.fitted else {
            return 0.0;
        };
        let scaler = &fitted.snapshot.fraud_scaler;

        let result = scaler.transform_all(history).and_then(|history| {
            let candidate = scaler.transform(candidate)?;
            self.fraud_model.fraud_probability(&history, &candidate)
        });

        match result {
            Ok(p) => p,
            Err(e) => {
                warn!("Fraud detection failed: {}", e);
                0.0
            }
        }
    }
}

/// Uniform `[0, 1)` rows.
pub fn random_rows<const N: usize, R: Rng>(n: usize, rng: &mut R) -> Vec<[f64; N]> {
    (0..n)
        .map(|_| std::array::from_fn(|_| rng.gen::<f64>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::TempDir;

    #[test]
    fn test_unfitted_defaults() {
        let models = Models::new(ModelParams::default());
        assert!(!models.is_fitted());
        assert!(!models.detect_trust_anomaly(&[0.0; TRUST_FEATURES]));
        assert_eq!(
            models.fraud_probability(&[[1.0; DELIVERY_FEATURES]; 6], &[1e6; DELIVERY_FEATURES]),
            0.0
        );
        assert!(models.snapshot().is_none());
    }

    #[test]
    fn test_baseline_training() {
        let mut rng = StdRng::seed_from_u64(1);
        let models = Models::train(ModelParams::default(), &[], &[], &mut rng).unwrap();

        let snapshot = models.snapshot().unwrap();
        assert!(snapshot.baseline);
        assert_eq!(snapshot.trust_rows.len(), BASELINE_TRUST_ROWS);
        assert_eq!(snapshot.trust_scaler.width(), TRUST_FEATURES);
        assert_eq!(snapshot.fraud_scaler.width(), DELIVERY_FEATURES);
    }

    #[test]
    fn test_real_rows_used() {
        let mut rng = StdRng::seed_from_u64(2);
        let trust_rows: Vec<TrustRow> = (0..20)
            .map(|i| {
                let x = i as f64;
                [x, x % 3.0, x / 40.0, 150.0 + x * 5.0, x % 5.0, 1.0 + x / 10.0, 60.0 + x]
            })
            .collect();
        let models = Models::train(ModelParams::default(), &trust_rows, &[], &mut rng).unwrap();

        let snapshot = models.snapshot().unwrap();
        assert!(!snapshot.baseline);
        assert_eq!(snapshot.trust_rows.len(), 20);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let models = Models::train(ModelParams::default(), &[], &[], &mut rng).unwrap();
        models.save(dir.path()).unwrap();

        let loaded = Models::load(ModelParams::default(), dir.path());
        assert!(loaded.is_fitted());
        assert_eq!(loaded.snapshot(), models.snapshot());
    }

    #[test]
    fn test_missing_snapshot_is_unfitted() {
        let dir = TempDir::new().unwrap();
        let models = Models::load(ModelParams::default(), dir.path());
        assert!(!models.is_fitted());

        std::fs::write(dir.path().join(SNAPSHOT_FILE), b"not json").unwrap();
        let models = Models::load(ModelParams::default(), dir.path());
        assert!(!models.is_fitted());
    }

    #[test]
    fn test_fraud_probability_with_fitted_models() {
        let mut rng = StdRng::seed_from_u64(4);
        let delivery_rows: Vec<DeliveryRow> = (0..30)
            .map(|i| [100.0 + i as f64, 2.0, 10.0, 28.6, 77.2])
            .collect();
        let trust_rows: Vec<TrustRow> = (0..12)
            .map(|i| {
                let x = i as f64;
                [5.0 + x, x % 2.0, x / 100.0, 100.0 + x, x % 4.0, x / 6.0, 90.0 - x]
            })
            .collect();
        let models =
            Models::train(ModelParams::default(), &trust_rows, &delivery_rows, &mut rng).unwrap();

        let history = &delivery_rows[..10];
        assert_eq!(
            models.fraud_probability(history, &[105.0, 2.0, 10.0, 28.6, 77.2]),
            0.0
        );
        assert_eq!(
            models.fraud_probability(history, &[9000.0, 40.0, 3.0, 0.0, 0.0]),
            1.0
        );
    }
}
