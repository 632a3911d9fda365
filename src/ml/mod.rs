//! Machine learning building blocks
//!
//! Feature scaling, tree-ensemble regressors used by the forecaster, and the
//! isolation forest used by the multivariate anomaly audit.

pub mod anomaly_detection;
pub mod models;
pub mod pipeline;
pub mod preprocessing;

pub use anomaly_detection::IsolationForest;
pub use pipeline::Transformer;
pub use preprocessing::StandardScaler;
