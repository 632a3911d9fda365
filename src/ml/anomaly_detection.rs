//! Anomaly detection module
//!
//! Isolation Forest over rows of numeric features. Samples that random
//! axis-aligned splits isolate quickly get scores close to 1.

use crate::error::{Error, Result};
use crate::stats::descriptive::quantile;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Largest sub-sample drawn per tree
pub const MAX_SAMPLES: usize = 256;

/// Isolation Forest anomaly detection algorithm
#[derive(Debug)]
pub struct IsolationForest {
    /// Number of isolation trees
    n_estimators: usize,
    /// Random seed
    random_seed: u64,
    /// Expected share of outliers
    contamination: f64,
    /// Scores of the training samples
    anomaly_scores: Vec<f64>,
    /// Training scores strictly above this are outliers
    threshold: f64,
    /// Sub-sample size actually used; normalizes path lengths
    sample_size: usize,
    n_features: usize,
    fitted: bool,
    trees: Vec<ITree>,
}

/// A single isolation tree
#[derive(Debug)]
struct ITree {
    root: Box<ITreeNode>,
}

#[derive(Debug)]
enum ITreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<ITreeNode>,
        right: Box<ITreeNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationForest {
    /// Create a new IsolationForest
    ///
    /// `contamination` must lie in (0, 0.5].
    pub fn new(n_estimators: usize, contamination: f64, random_seed: u64) -> Result<Self> {
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(Error::InvalidInput(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }
        if n_estimators == 0 {
            return Err(Error::InvalidInput(
                "isolation forest needs at least one tree".to_string(),
            ));
        }

        Ok(IsolationForest {
            n_estimators,
            random_seed,
            contamination,
            anomaly_scores: Vec::new(),
            threshold: 0.0,
            sample_size: 0,
            n_features: 0,
            fitted: false,
            trees: Vec::new(),
        })
    }

    /// Anomaly scores of the training samples
    pub fn anomaly_scores(&self) -> &[f64] {
        &self.anomaly_scores
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Build the forest and score the training samples
    pub fn fit(&mut self, data: &[Vec<f64>]) -> Result<()> {
        let n_samples = data.len();
        if n_samples == 0 {
            return Err(Error::InvalidInput(
                "IsolationForest requires at least one sample".to_string(),
            ));
        }
        let n_features = data[0].len();
        if let Some(bad) = data.iter().find(|row| row.len() != n_features) {
            return Err(Error::LengthMismatch {
                expected: n_features,
                actual: bad.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.random_seed);
        let sample_size = MAX_SAMPLES.min(n_samples);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut all_indices: Vec<usize> = (0..n_samples).collect();
        self.trees.clear();
        for _ in 0..self.n_estimators {
            all_indices.shuffle(&mut rng);
            let subsample = &all_indices[..sample_size];
            let root = build_tree(data, subsample, height_limit, 0, &mut rng);
            self.trees.push(ITree { root });
        }

        self.sample_size = sample_size;
        self.n_features = n_features;
        self.fitted = true;

        self.anomaly_scores = self.score_samples(data)?;
        self.threshold = quantile(&self.anomaly_scores, 1.0 - self.contamination);

        debug!(
            "IsolationForest fitted on {} samples ({} trees, sub-sample {}), threshold {:.4}",
            n_samples, self.n_estimators, sample_size, self.threshold
        );
        Ok(())
    }

    /// Fit, then return the outlier flags of the training samples
    pub fn fit_predict(&mut self, data: &[Vec<f64>]) -> Result<Vec<bool>> {
        self.fit(data)?;
        Ok(self
            .anomaly_scores
            .iter()
            .map(|&s| s > self.threshold)
            .collect())
    }

    /// Anomaly score in (0, 1] for each row; 0.5 means no evidence either way
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(Error::ModelNotFitted("IsolationForest".to_string()));
        }

        let normalizer = c_factor(self.sample_size);
        data.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(Error::LengthMismatch {
                        expected: self.n_features,
                        actual: row.len(),
                    });
                }
                if normalizer <= 0.0 {
                    return Ok(0.5);
                }
                let total: f64 = self
                    .trees
                    .iter()
                    .map(|tree| path_length(&tree.root, row, 0))
                    .sum();
                let avg = total / self.trees.len() as f64;
                Ok(2f64.powf(-avg / normalizer))
            })
            .collect()
    }
}

fn build_tree(
    data: &[Vec<f64>],
    indices: &[usize],
    height_limit: usize,
    depth: usize,
    rng: &mut StdRng,
) -> Box<ITreeNode> {
    if depth >= height_limit || indices.len() <= 1 {
        return Box::new(ITreeNode::Leaf {
            size: indices.len(),
        });
    }

    // Only features that vary inside this node can separate it
    let ranges: Vec<(usize, f64, f64)> = (0..data[indices[0]].len())
        .filter_map(|feature| {
            let (min, max) = indices.iter().map(|&i| data[i][feature]).fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), v| (lo.min(v), hi.max(v)),
            );
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if ranges.is_empty() {
        return Box::new(ITreeNode::Leaf {
            size: indices.len(),
        });
    }

    let (feature, min, max) = ranges[rng.random_range(0..ranges.len())];
    let threshold = min + rng.random::<f64>() * (max - min);

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| data[i][feature] < threshold);

    Box::new(ITreeNode::Split {
        feature,
        threshold,
        left: build_tree(data, &left, height_limit, depth + 1, rng),
        right: build_tree(data, &right, height_limit, depth + 1, rng),
    })
}

fn path_length(node: &ITreeNode, x: &[f64], depth: usize) -> f64 {
    match node {
        ITreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] < *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
        ITreeNode::Leaf { size } => depth as f64 + c_factor(*size),
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn c_factor(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + EULER_GAMMA;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}
