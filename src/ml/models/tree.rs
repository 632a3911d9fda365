//! Decision Tree implementation
//!
//! This module provides a CART (Classification and Regression Trees) regression
//! tree. It is the base learner of both ensembles in [`super::ensemble`].

use crate::error::{Error, Result};
use crate::ml::models::{check_lengths, check_sample, Regressor};
use serde::{Deserialize, Serialize};

/// Nodes with fewer samples are never split
const MIN_SAMPLES_SPLIT: usize = 2;

/// Configuration for decision tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTreeConfig {
    /// Maximum depth of the tree (None = no limit)
    pub max_depth: Option<usize>,
}

/// A node in the decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index used for splitting
    pub feature_index: Option<usize>,
    /// Threshold for the split; samples `<= threshold` go left
    pub threshold: Option<f64>,
    /// Prediction value (mean target for leaf nodes)
    pub prediction: f64,
    /// Left child node index
    pub left_child: Option<usize>,
    /// Right child node index
    pub right_child: Option<usize>,
    /// Number of samples at this node
    pub n_samples: usize,
    /// Impurity (MSE) at this node
    pub impurity: f64,
    /// Depth of this node
    pub depth: usize,
    /// Whether this is a leaf node
    pub is_leaf: bool,
}

impl TreeNode {
    fn new_leaf(prediction: f64, n_samples: usize, impurity: f64, depth: usize) -> Self {
        TreeNode {
            feature_index: None,
            threshold: None,
            prediction,
            left_child: None,
            right_child: None,
            n_samples,
            impurity,
            depth,
            is_leaf: true,
        }
    }

    fn new_split(
        feature_index: usize,
        threshold: f64,
        prediction: f64,
        n_samples: usize,
        impurity: f64,
        depth: usize,
    ) -> Self {
        TreeNode {
            feature_index: Some(feature_index),
            threshold: Some(threshold),
            prediction,
            left_child: None,
            right_child: None,
            n_samples,
            impurity,
            depth,
            is_leaf: false,
        }
    }
}

/// Best split found for a node
struct Split {
    feature_index: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Decision Tree Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    config: DecisionTreeConfig,
    nodes: Vec<TreeNode>,
    n_features: usize,
    feature_importances_: Option<Vec<f64>>,
    is_fitted: bool,
}

impl DecisionTreeRegressor {
    /// Create a new decision tree regressor
    pub fn new(config: DecisionTreeConfig) -> Self {
        DecisionTreeRegressor {
            config,
            nodes: Vec::new(),
            n_features: 0,
            feature_importances_: None,
            is_fitted: false,
        }
    }

    /// Normalized impurity-decrease importances, one per feature
    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances_.as_deref()
    }

    /// Mean and MSE of the targets at `indices`
    fn node_stats(y: &[f64], indices: &[usize]) -> (f64, f64) {
        if indices.is_empty() {
            return (0.0, 0.0);
        }
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
        let mse = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n;
        (mean, mse)
    }

    /// Find the split with the largest reduction in squared error
    fn find_best_split(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
    ) -> Option<Split> {
        let n = indices.len();
        if n < MIN_SAMPLES_SPLIT {
            return None;
        }

        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut best_gain = 1e-12 * (1.0 + parent_sse.abs());
        let mut best: Option<(usize, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in 0..self.n_features {
            sorted.sort_by(|&a, &b| {
                x[a][feature_idx]
                    .partial_cmp(&x[b][feature_idx])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let v = y[sorted[pos]];
                left_sum += v;
                left_sq += v * v;

                let current = x[sorted[pos]][feature_idx];
                let next = x[sorted[pos + 1]][feature_idx];
                if !(next > current) {
                    continue;
                }

                let left_n = pos + 1;
                let right_n = n - left_n;

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / left_n as f64;
                let right_sse = right_sq - right_sum * right_sum / right_n as f64;
                let gain = parent_sse - left_sse - right_sse;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature_idx, (current + next) / 2.0));
                }
            }
        }

        let (feature_index, threshold) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[i][feature_index] <= threshold);
        if left.is_empty() || right.is_empty() {
            return None;
        }

        Some(Split {
            feature_index,
            threshold,
            left,
            right,
        })
    }

    /// Build the tree recursively, returning the index of the created node
    fn build_tree(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
    ) -> usize {
        let (prediction, impurity) = Self::node_stats(y, &indices);
        let total = indices.len();

        // Check stopping conditions
        let should_stop = self.config.max_depth.map(|d| depth >= d).unwrap_or(false)
            || total < MIN_SAMPLES_SPLIT
            || impurity <= 0.0;

        if !should_stop {
            if let Some(split) = self.find_best_split(x, y, &indices) {
                let node = TreeNode::new_split(
                    split.feature_index,
                    split.threshold,
                    prediction,
                    total,
                    impurity,
                    depth,
                );
                let node_idx = self.nodes.len();
                self.nodes.push(node);

                let left_child_idx = self.build_tree(x, y, split.left, depth + 1);
                let right_child_idx = self.build_tree(x, y, split.right, depth + 1);

                self.nodes[node_idx].left_child = Some(left_child_idx);
                self.nodes[node_idx].right_child = Some(right_child_idx);
                return node_idx;
            }
        }

        let node_idx = self.nodes.len();
        self.nodes
            .push(TreeNode::new_leaf(prediction, total, impurity, depth));
        node_idx
    }

    /// Fit on a subset of rows; `indices` may repeat rows (bootstrap samples)
    pub fn fit_indices(&mut self, x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Result<()> {
        self.n_features = check_lengths(x, y)?;
        if indices.is_empty() {
            return Err(Error::InvalidInput(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= x.len()) {
            return Err(Error::InvalidInput(format!(
                "sample index {} out of range for {} rows",
                bad,
                x.len()
            )));
        }

        self.nodes.clear();
        self.build_tree(x, y, indices.to_vec(), 0);
        self.calculate_feature_importances();
        self.is_fitted = true;
        Ok(())
    }

    /// Index of the leaf node a sample falls into
    pub fn apply(&self, sample: &[f64]) -> Result<usize> {
        if !self.is_fitted {
            return Err(Error::ModelNotFitted("decision tree".to_string()));
        }
        check_sample(sample, self.n_features)?;

        let mut node_idx = 0;
        loop {
            let node = &self.nodes[node_idx];
            if node.is_leaf {
                return Ok(node_idx);
            }
            let next = match (node.feature_index, node.threshold) {
                (Some(feature), Some(threshold)) if sample[feature] <= threshold => {
                    node.left_child
                }
                (Some(_), Some(_)) => node.right_child,
                _ => None,
            };
            match next {
                Some(child) => node_idx = child,
                None => return Ok(node_idx),
            }
        }
    }

    /// Overwrite the value predicted by a leaf
    pub fn set_leaf_value(&mut self, node_idx: usize, value: f64) -> Result<()> {
        match self.nodes.get_mut(node_idx) {
            Some(node) if node.is_leaf => {
                node.prediction = value;
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!(
                "node {} is not a leaf",
                node_idx
            ))),
        }
    }

    /// Calculate feature importances
    fn calculate_feature_importances(&mut self) {
        let mut importances = vec![0.0f64; self.n_features];
        let total_samples = self.nodes.first().map(|n| n.n_samples).unwrap_or(1) as f64;

        for node in &self.nodes {
            if let (false, Some(feature_idx), Some(left_idx), Some(right_idx)) = (
                node.is_leaf,
                node.feature_index,
                node.left_child,
                node.right_child,
            ) {
                let left_node = &self.nodes[left_idx];
                let right_node = &self.nodes[right_idx];
                let weighted_impurity_decrease = (node.n_samples as f64 / total_samples)
                    * (node.impurity
                        - (left_node.n_samples as f64 / node.n_samples as f64) * left_node.impurity
                        - (right_node.n_samples as f64 / node.n_samples as f64)
                            * right_node.impurity);
                if feature_idx < importances.len() {
                    importances[feature_idx] += weighted_impurity_decrease;
                }
            }
        }

        // Normalize
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }
        self.feature_importances_ = Some(importances);
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let indices: Vec<usize> = (0..x.len()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict_one(&self, sample: &[f64]) -> Result<f64> {
        let leaf = self.apply(sample)?;
        Ok(self.nodes[leaf].prediction)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
