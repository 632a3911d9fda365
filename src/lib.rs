//! Quarterly KPI forecasting and anomaly detection
//!
//! Forecasts come from tree ensembles trained on time-based features and rolled
//! forward one quarter at a time; anomalies come from a causal z-score scorer
//! and an isolation-forest audit.

pub mod analytics;
pub mod config;
pub mod error;
pub mod io;
pub mod ml;
pub mod series;
pub mod service;
pub mod stats;
pub mod time_series;

// Re-export commonly used types
pub use analytics::{AnomalyResult, Direction, MultivariateDetector, Severity, ZScoreDetector};
pub use config::{AnomalyConfig, EngineConfig, ForecastConfig, ModelType};
pub use error::{Error, Result};
pub use series::{Observation, Period};
pub use service::{audit_kpi_anomalies, detect_kpi_anomalies, forecast_kpi, KpiForecast};
pub use time_series::{ForecastPoint, ForecastResult, KpiForecaster};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
