//! Per-column standardization.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};

/// Column means and population standard deviations fitted on training rows.
///
/// Zero-variance columns use a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    /// Fit on `rows`.
    pub fn fit<const N: usize>(rows: &[[f64; N]]) -> Result<Self> {
        if rows.is_empty() {
            return Err(ScoringError::EmptyTrainingSet);
        }
        let n = rows.len() as f64;

        let mut mean = vec![0.0; N];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = vec![0.0; N];
        for row in rows {
            for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 { std } else { 1.0 };
        }

        Ok(Self { mean, scale })
    }

    /// Number of columns this standardizer was fitted on.
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one row.
    pub fn transform<const N: usize>(&self, row: &[f64; N]) -> Result<[f64; N]> {
        if self.width() != N {
            return Err(ScoringError::WidthMismatch {
                expected: self.width(),
                actual: N,
            });
        }
        let mut out = [0.0; N];
        for (i, v) in row.iter().enumerate() {
            out[i] = (v - self.mean[i]) / self.scale[i];
        }
        Ok(out)
    }

    /// Standardize many rows.
    pub fn transform_all<const N: usize>(&self, rows: &[[f64; N]]) -> Result<Vec<[f64; N]>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let rows = [[1.0, 10.0], [3.0, 10.0]];
        let scaler = Standardizer::fit(&rows).unwrap();

        assert_eq!(scaler.transform(&[1.0, 10.0]).unwrap(), [-1.0, 0.0]);
        assert_eq!(scaler.transform(&[3.0, 12.0]).unwrap(), [1.0, 2.0]);
    }

    #[test]
    fn test_empty_rejected() {
        let rows: [[f64; 3]; 0] = [];
        assert!(matches!(
            Standardizer::fit(&rows),
            Err(ScoringError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = Standardizer::fit(&[[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]]).unwrap();
        let err = scaler.transform(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::WidthMismatch {
                expected: 7,
                actual: 5
            }
        ));
    }
}
