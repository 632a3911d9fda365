//! Regression models
//!
//! Tree-based regressors used by the forecaster: a CART regression tree and the
//! random-forest and gradient-boosting ensembles built from it.

pub mod ensemble;
pub mod tree;

use crate::error::{Error, Result};
use std::fmt::Debug;

pub use ensemble::{
    GBLoss, GradientBoostingConfig, GradientBoostingConfigBuilder, GradientBoostingRegressor,
    RandomForestConfig, RandomForestConfigBuilder, RandomForestRegressor,
};
pub use tree::{DecisionTreeConfig, DecisionTreeRegressor};

/// Common interface of supervised regression models
pub trait Regressor: Debug {
    /// Fit the model on feature rows `x` and targets `y`
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Predict a single feature row
    fn predict_one(&self, sample: &[f64]) -> Result<f64>;

    /// Whether fit() has completed
    fn is_fitted(&self) -> bool;

    /// Predict every row
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Coefficient of determination (R^2) on the given data
    fn score(&self, x: &[Vec<f64>], y: &[f64]) -> Result<f64> {
        let predictions = self.predict(x)?;
        check_lengths(x, y)?;
        let y_mean = y.iter().sum::<f64>() / y.len() as f64;
        let ss_tot: f64 = y.iter().map(|a| (a - y_mean).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(y)
            .map(|(p, a)| (a - p).powi(2))
            .sum();
        if ss_tot == 0.0 {
            return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
        }
        Ok(1.0 - ss_res / ss_tot)
    }
}

/// Validate a training set: non-empty, matching lengths, rectangular rows
pub(crate) fn check_lengths(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() {
        return Err(Error::InvalidInput("training data is empty".to_string()));
    }
    if x.len() != y.len() {
        return Err(Error::LengthMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    let n_features = x[0].len();
    if n_features == 0 {
        return Err(Error::InvalidInput("no feature columns".to_string()));
    }
    if let Some(bad) = x.iter().find(|row| row.len() != n_features) {
        return Err(Error::LengthMismatch {
            expected: n_features,
            actual: bad.len(),
        });
    }
    Ok(n_features)
}

/// Reject a sample whose width differs from the training width
pub(crate) fn check_sample(sample: &[f64], n_features: usize) -> Result<()> {
    if sample.len() != n_features {
        return Err(Error::LengthMismatch {
            expected: n_features,
            actual: sample.len(),
        });
    }
    Ok(())
}
