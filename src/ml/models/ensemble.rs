//! Ensemble Methods for Machine Learning
//!
//! This module provides ensemble learning algorithms including:
//! - Random Forest Regressor (bootstrap aggregated regression trees)
//! - Gradient Boosting Regressor with squared and quantile losses
//!
//! Quantile boosting is what gives forecasts a lower and upper confidence bound.

use crate::error::{Error, Result};
use crate::ml::models::tree::{DecisionTreeConfig, DecisionTreeRegressor};
use crate::ml::models::{check_lengths, check_sample, Regressor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_SEED: u64 = 42;

/// Configuration for Random Forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum depth of each tree (None = no limit)
    pub max_depth: Option<usize>,
    /// Seed for the bootstrap draws
    pub random_seed: Option<u64>,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        RandomForestConfig {
            n_estimators: 100,
            max_depth: None,
            random_seed: None,
        }
    }
}

/// Builder for RandomForestConfig
pub struct RandomForestConfigBuilder {
    config: RandomForestConfig,
}

impl RandomForestConfigBuilder {
    pub fn new() -> Self {
        RandomForestConfigBuilder {
            config: RandomForestConfig::default(),
        }
    }

    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = Some(depth);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> RandomForestConfig {
        self.config
    }
}

impl Default for RandomForestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Random Forest Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: RandomForestConfig,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
    feature_importances_: Option<Vec<f64>>,
    is_fitted: bool,
}

impl RandomForestRegressor {
    /// Create a new random forest regressor
    pub fn new(config: RandomForestConfig) -> Self {
        RandomForestRegressor {
            config,
            trees: Vec::new(),
            n_features: 0,
            feature_importances_: None,
            is_fitted: false,
        }
    }

    /// Get the number of trees
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree importances
    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances_.as_deref()
    }

    /// Bootstrap sample indices, drawn with replacement
    fn bootstrap_indices(n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
        (0..n_samples)
            .map(|_| rng.random_range(0..n_samples))
            .collect()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.n_features = check_lengths(x, y)?;
        if self.config.n_estimators == 0 {
            return Err(Error::InvalidInput(
                "random forest needs at least one tree".to_string(),
            ));
        }

        let n_samples = x.len();
        let seed = self.config.random_seed.unwrap_or(DEFAULT_SEED);
        let mut rng = StdRng::seed_from_u64(seed);

        self.trees.clear();
        for _ in 0..self.config.n_estimators {
            let indices = Self::bootstrap_indices(n_samples, &mut rng);
            let mut tree = DecisionTreeRegressor::new(DecisionTreeConfig {
                max_depth: self.config.max_depth,
            });
            tree.fit_indices(x, y, &indices)?;
            self.trees.push(tree);
        }

        self.feature_importances_ = Some(average_importances(
            self.trees.iter().filter_map(|t| t.feature_importances()),
            self.n_features,
        ));
        self.is_fitted = true;
        Ok(())
    }

    fn predict_one(&self, sample: &[f64]) -> Result<f64> {
        if !self.is_fitted {
            return Err(Error::ModelNotFitted("random forest".to_string()));
        }
        check_sample(sample, self.n_features)?;

        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict_one(sample)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Loss functions for Gradient Boosting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GBLoss {
    /// Squared error; predicts the conditional mean
    #[default]
    SquaredError,
    /// Pinball loss; predicts the conditional `alpha` quantile
    Quantile { alpha: f64 },
}

/// Configuration for Gradient Boosting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting stages
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Loss function
    pub loss: GBLoss,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        GradientBoostingConfig {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            loss: GBLoss::SquaredError,
        }
    }
}

/// Builder for GradientBoostingConfig
pub struct GradientBoostingConfigBuilder {
    config: GradientBoostingConfig,
}

impl GradientBoostingConfigBuilder {
    pub fn new() -> Self {
        GradientBoostingConfigBuilder {
            config: GradientBoostingConfig::default(),
        }
    }

    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.config.learning_rate = rate;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn loss(mut self, loss: GBLoss) -> Self {
        self.config.loss = loss;
        self
    }

    /// Shorthand for `loss(GBLoss::Quantile { alpha })`
    pub fn quantile(mut self, alpha: f64) -> Self {
        self.config.loss = GBLoss::Quantile { alpha };
        self
    }

    pub fn build(self) -> GradientBoostingConfig {
        self.config
    }
}

impl Default for GradientBoostingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
    feature_importances_: Option<Vec<f64>>,
    is_fitted: bool,
}

impl GradientBoostingRegressor {
    /// Create a new gradient boosting regressor
    pub fn new(config: GradientBoostingConfig) -> Self {
        GradientBoostingRegressor {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            feature_importances_: None,
            is_fitted: false,
        }
    }

    /// Mean of the per-stage importances
    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances_.as_deref()
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.config.learning_rate > 0.0) {
            return Err(Error::InvalidInput(format!(
                "learning_rate must be positive, got {}",
                self.config.learning_rate
            )));
        }
        if let GBLoss::Quantile { alpha } = self.config.loss {
            if !(alpha > 0.0 && alpha < 1.0) {
                return Err(Error::InvalidInput(format!(
                    "quantile alpha must be in (0, 1), got {}",
                    alpha
                )));
            }
        }
        Ok(())
    }

    /// Constant model the boosting stages start from
    fn initial_estimate(&self, y: &[f64]) -> f64 {
        match self.config.loss {
            GBLoss::SquaredError => y.iter().sum::<f64>() / y.len() as f64,
            GBLoss::Quantile { alpha } => lower_percentile(y, alpha),
        }
    }

    /// Calculate negative gradient of the loss
    fn negative_gradient(&self, y: &[f64], predictions: &[f64]) -> Vec<f64> {
        match self.config.loss {
            GBLoss::SquaredError => y.iter().zip(predictions).map(|(yi, pi)| yi - pi).collect(),
            GBLoss::Quantile { alpha } => y
                .iter()
                .zip(predictions)
                .map(|(yi, pi)| if yi > pi { alpha } else { alpha - 1.0 })
                .collect(),
        }
    }

    /// Re-estimate leaf values under the pinball loss
    ///
    /// Each leaf predicts the `alpha` percentile of the raw residuals of the
    /// samples that reached it.
    fn update_terminal_regions(
        &self,
        tree: &mut DecisionTreeRegressor,
        x: &[Vec<f64>],
        y: &[f64],
        predictions: &[f64],
    ) -> Result<()> {
        let GBLoss::Quantile { alpha } = self.config.loss else {
            return Ok(());
        };

        let mut leaf_residuals: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for (i, row) in x.iter().enumerate() {
            let leaf = tree.apply(row)?;
            leaf_residuals
                .entry(leaf)
                .or_default()
                .push(y[i] - predictions[i]);
        }
        for (leaf, residuals) in leaf_residuals {
            tree.set_leaf_value(leaf, lower_percentile(&residuals, alpha))?;
        }
        Ok(())
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.n_features = check_lengths(x, y)?;
        self.validate_config()?;

        self.initial_prediction = self.initial_estimate(y);
        let mut predictions = vec![self.initial_prediction; y.len()];

        self.trees.clear();
        for _ in 0..self.config.n_estimators {
            let residuals = self.negative_gradient(y, &predictions);

            // Fit tree to the negative gradient
            let mut tree = DecisionTreeRegressor::new(DecisionTreeConfig {
                max_depth: Some(self.config.max_depth),
            });
            tree.fit(x, &residuals)?;
            self.update_terminal_regions(&mut tree, x, y, &predictions)?;

            // Update predictions
            for (pred, row) in predictions.iter_mut().zip(x) {
                *pred += self.config.learning_rate * tree.predict_one(row)?;
            }

            self.trees.push(tree);
        }

        self.feature_importances_ = Some(average_importances(
            self.trees.iter().filter_map(|t| t.feature_importances()),
            self.n_features,
        ));
        self.is_fitted = true;
        Ok(())
    }

    fn predict_one(&self, sample: &[f64]) -> Result<f64> {
        if !self.is_fitted {
            return Err(Error::ModelNotFitted("gradient boosting".to_string()));
        }
        check_sample(sample, self.n_features)?;

        let mut prediction = self.initial_prediction;
        for tree in &self.trees {
            prediction += self.config.learning_rate * tree.predict_one(sample)?;
        }
        Ok(prediction)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Smallest value whose cumulative share reaches `p` (unit sample weights)
fn lower_percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let target = p * sorted.len() as f64;
    let idx = sorted
        .iter()
        .enumerate()
        .position(|(i, _)| (i + 1) as f64 >= target)
        .unwrap_or(sorted.len() - 1);
    sorted[idx]
}

fn average_importances<'a, I>(per_tree: I, n_features: usize) -> Vec<f64>
where
    I: Iterator<Item = &'a [f64]>,
{
    let mut totals = vec![0.0; n_features];
    let mut count = 0usize;
    for importances in per_tree {
        for (total, &imp) in totals.iter_mut().zip(importances) {
            *total += imp;
        }
        count += 1;
    }
    if count > 0 {
        for total in &mut totals {
            *total /= count as f64;
        }
    }
    totals
}
