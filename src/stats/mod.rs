// Statistics helpers shared by the feature builder, estimators and detectors

pub mod descriptive;

pub use descriptive::{
    mean, percentile, population_std, quantile, round_to, sample_std, sample_variance,
};
