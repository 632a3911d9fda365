//! Transformer trait shared by feature preprocessing steps

use crate::error::Result;

/// Learns parameters from a feature matrix and applies them to other matrices
pub trait Transformer {
    /// Learn parameters from rows of features
    fn fit(&mut self, x: &[Vec<f64>]) -> Result<()>;

    /// Apply the learned parameters
    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;

    /// Learn, then transform the same data
    fn fit_transform(&mut self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit(x)?;
        self.transform(x)
    }
}
