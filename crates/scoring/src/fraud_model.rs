//! Delivery-fraud model: density clustering of a user's delivery history.
//!
//! The candidate is labelled the way a DBSCAN fit over history plus
//! candidate would label it. It belongs to a cluster if it is a core point
//! (at least `min_samples` points within `eps`, itself included) or lies
//! within `eps` of a core point. Anything else is noise.

use smartcore::metrics::distance::{Distance, Distances};

use crate::error::{Result, ScoringError};
use crate::features::DeliveryRow;

/// DBSCAN settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FraudModel {
    eps: f64,
    min_samples: usize,
}

impl FraudModel {
    /// Create a model with the given neighborhood radius and core size.
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Probability that `candidate` is fraudulent given `history`.
    ///
    /// Both inputs must already be standardized. Returns 1.0 when the
    /// candidate falls outside every cluster, else 0.0. With fewer history
    /// points than `min_samples` no cluster can form and the result is 0.0.
    pub fn fraud_probability(&self, history: &[DeliveryRow], candidate: &DeliveryRow) -> Result<f64> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ScoringError::Estimator(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if history.len() < self.min_samples {
            return Ok(0.0);
        }

        let mut points: Vec<Vec<f64>> = history.iter().map(|r| r.to_vec()).collect();
        points.push(candidate.to_vec());
        let candidate = points.len() - 1;

        let metric = Distances::euclidian::<f64>();
        let neighbours = |i: usize| -> Vec<usize> {
            (0..points.len())
                .filter(|&j| metric.distance(&points[i], &points[j]) <= self.eps)
                .collect()
        };
        let is_core = |i: usize| neighbours(i).len() >= self.min_samples;

        let clustered = is_core(candidate)
            || neighbours(candidate)
                .into_iter()
                .any(|j| j != candidate && is_core(j));

        Ok(if clustered { 0.0 } else { 1.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> Vec<DeliveryRow> {
        (0..8)
            .map(|i| {
                let d = i as f64 * 0.01;
                [d, d, 0.0, 0.0, 0.0]
            })
            .collect()
    }

    #[test]
    fn test_point_inside_cluster() {
        let model = FraudModel::new(0.5, 5);
        let p = model
            .fraud_probability(&cluster(), &[0.02, 0.02, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_far_point_is_noise() {
        let model = FraudModel::new(0.5, 5);
        let p = model
            .fraud_probability(&cluster(), &[9.0, -9.0, 9.0, 0.0, 3.0])
            .unwrap();
        assert_eq!(p, 1.0);
    }

    #[test]
    fn test_short_history() {
        let model = FraudModel::new(0.5, 5);
        let history = &cluster()[..3];
        let p = model
            .fraud_probability(history, &[9.0, 9.0, 9.0, 9.0, 9.0])
            .unwrap();
        assert_eq!(p, 0.0);
        assert_eq!(model.fraud_probability(&[], &[0.0; 5]).unwrap(), 0.0);
    }

    fn on_axis(xs: &[f64]) -> Vec<DeliveryRow> {
        xs.iter().map(|&x| [x, 0.0, 0.0, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_candidate_next_to_border_point_is_noise() {
        // 0.525 reaches only two cluster points, so it is a border point
        // and cannot pull the candidate into the cluster.
        let model = FraudModel::new(0.5, 5);
        let history = on_axis(&[0.0, 0.01, 0.02, 0.03, 0.04, 0.525]);
        let p = model
            .fraud_probability(&history, &[1.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(p, 1.0);
    }

    #[test]
    fn test_candidate_next_to_core_point_is_clustered() {
        // 0.45 reaches all five cluster points, so it is core and the
        // candidate joins the cluster as a border point.
        let model = FraudModel::new(0.5, 5);
        let history = on_axis(&[0.0, 0.01, 0.02, 0.03, 0.04, 0.45]);
        let p = model
            .fraud_probability(&history, &[0.9, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_dense_candidate_is_core() {
        let model = FraudModel::new(0.5, 3);
        let history = on_axis(&[0.0, 5.0, 5.1]);
        let p = model
            .fraud_probability(&history, &[5.2, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_invalid_eps() {
        let model = FraudModel::new(0.0, 2);
        assert!(model.fraud_probability(&cluster(), &[0.0; 5]).is_err());
    }
}
