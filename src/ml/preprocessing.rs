//! Feature preprocessing
//!
//! Standardization of feature matrices before they reach the tree ensembles.

use crate::error::{Error, Result};
use crate::ml::pipeline::Transformer;
use serde::{Deserialize, Serialize};

/// Standardizes each column to zero mean and unit variance
///
/// Standard deviations are population (ddof = 0) estimates. A constant column
/// keeps a scale of 1, so it transforms to all zeros instead of dividing by zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column means
    means: Vec<f64>,
    /// Per-column divisors
    scales: Vec<f64>,
    /// Whether fit() has been called
    fitted: bool,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        StandardScaler::default()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Scale a single feature row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(Error::ModelNotFitted(
                "StandardScaler has not been fitted yet".to_string(),
            ));
        }
        if row.len() != self.means.len() {
            return Err(Error::LengthMismatch {
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(&v, (&mean, &scale))| (v - mean) / scale)
            .collect())
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &[Vec<f64>]) -> Result<()> {
        let first = x.first().ok_or_else(|| {
            Error::InvalidInput("StandardScaler requires at least one row".to_string())
        })?;
        let n_features = first.len();
        if let Some(bad) = x.iter().find(|row| row.len() != n_features) {
            return Err(Error::LengthMismatch {
                expected: n_features,
                actual: bad.len(),
            });
        }

        let n = x.len() as f64;
        let mut means = vec![0.0; n_features];
        for row in x {
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut scales = vec![0.0; n_features];
        for row in x {
            for ((s, &v), &m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut scales {
            let std = (*s / n).sqrt();
            *s = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        }

        self.means = means;
        self.scales = scales;
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }
}
