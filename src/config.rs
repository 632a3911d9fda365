//! Engine configuration
//!
//! Configuration is constructed explicitly and handed to each component; there is
//! no process-wide settings object. It can be built in code with the builders or
//! loaded from a TOML or YAML document:
//!
//! ```toml
//! [forecast]
//! model_type = "random_forest"
//! n_estimators = 50
//!
//! [anomaly]
//! zscore_threshold = 2.0
//! rolling_window = 6
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Minimum number of observations required to fit a forecaster
pub const MIN_FORECAST_POINTS: usize = 4;
/// Minimum number of observations for z-score anomaly detection
pub const MIN_ANOMALY_POINTS: usize = 4;
/// Default z-score at which a point becomes a WARNING anomaly
pub const ANOMALY_ZSCORE_WARNING: f64 = 2.5;
/// Default z-score at which an anomaly becomes CRITICAL
pub const ANOMALY_ZSCORE_CRITICAL: f64 = 3.5;
/// Default rolling baseline window, in quarters
pub const DEFAULT_ROLLING_WINDOW: usize = 8;
/// Default forecast horizon, in quarters
pub const DEFAULT_FORECAST_QUARTERS: usize = 4;

/// Regression ensemble used by the forecaster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Gradient boosting with quantile models for the confidence band
    GradientBoosting,
    /// Random forest with a fixed-width fallback band
    RandomForest,
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GradientBoosting
    }
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gradient_boosting" => Ok(ModelType::GradientBoosting),
            "random_forest" => Ok(ModelType::RandomForest),
            other => Err(Error::Config(format!(
                "unknown model_type '{}', expected gradient_boosting or random_forest",
                other
            ))),
        }
    }
}

/// Forecaster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Ensemble family
    pub model_type: ModelType,
    /// Number of boosting stages or forest trees
    pub n_estimators: usize,
    /// Coverage of the confidence band, in (0, 1)
    pub confidence_level: f64,
    /// Seed shared by every ensemble
    pub random_state: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            model_type: ModelType::GradientBoosting,
            n_estimators: 100,
            confidence_level: 0.95,
            random_state: 42,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be at least 1".to_string()));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Lower quantile of the band; the upper one is `1 - alpha`
    pub fn alpha(&self) -> f64 {
        (1.0 - self.confidence_level) / 2.0
    }
}

/// Builder for ForecastConfig
pub struct ForecastConfigBuilder {
    config: ForecastConfig,
}

impl ForecastConfigBuilder {
    pub fn new() -> Self {
        ForecastConfigBuilder {
            config: ForecastConfig::default(),
        }
    }

    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.config.model_type = model_type;
        self
    }

    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn confidence_level(mut self, level: f64) -> Self {
        self.config.confidence_level = level;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    pub fn build(self) -> ForecastConfig {
        self.config
    }
}

impl Default for ForecastConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Anomaly detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// |z| at or above which a point is flagged (WARNING)
    pub zscore_threshold: f64,
    /// |z| at or above which a flagged point is CRITICAL
    pub critical_threshold: f64,
    /// Use a trailing fixed window once enough history exists
    pub use_rolling_stats: bool,
    /// Trailing window length, in quarters
    pub rolling_window: usize,
    /// Seed for the isolation forest
    pub random_state: u64,
    /// Expected outlier share for the isolation forest, in (0, 0.5]
    pub contamination: f64,
    /// Trees in the isolation forest
    pub isolation_estimators: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            zscore_threshold: ANOMALY_ZSCORE_WARNING,
            critical_threshold: ANOMALY_ZSCORE_CRITICAL,
            use_rolling_stats: true,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            random_state: 42,
            contamination: 0.1,
            isolation_estimators: 200,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.zscore_threshold > 0.0) {
            return Err(Error::Config(format!(
                "zscore_threshold must be positive, got {}",
                self.zscore_threshold
            )));
        }
        if self.critical_threshold < self.zscore_threshold {
            return Err(Error::Config(format!(
                "critical_threshold ({}) must not be below zscore_threshold ({})",
                self.critical_threshold, self.zscore_threshold
            )));
        }
        if self.rolling_window == 0 {
            return Err(Error::Config("rolling_window must be at least 1".to_string()));
        }
        validate_contamination(self.contamination).map_err(|e| Error::Config(e.to_string()))?;
        if self.isolation_estimators == 0 {
            return Err(Error::Config(
                "isolation_estimators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check the isolation-forest outlier share
pub fn validate_contamination(contamination: f64) -> Result<()> {
    if contamination > 0.0 && contamination <= 0.5 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "contamination must be in (0, 0.5], got {}",
            contamination
        )))
    }
}

/// Builder for AnomalyConfig
pub struct AnomalyConfigBuilder {
    config: AnomalyConfig,
}

impl AnomalyConfigBuilder {
    pub fn new() -> Self {
        AnomalyConfigBuilder {
            config: AnomalyConfig::default(),
        }
    }

    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.config.zscore_threshold = threshold;
        self
    }

    pub fn critical_threshold(mut self, threshold: f64) -> Self {
        self.config.critical_threshold = threshold;
        self
    }

    pub fn use_rolling_stats(mut self, enabled: bool) -> Self {
        self.config.use_rolling_stats = enabled;
        self
    }

    pub fn rolling_window(mut self, window: usize) -> Self {
        self.config.rolling_window = window;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = seed;
        self
    }

    pub fn contamination(mut self, contamination: f64) -> Self {
        self.config.contamination = contamination;
        self
    }

    pub fn isolation_estimators(mut self, n: usize) -> Self {
        self.config.isolation_estimators = n;
        self
    }

    pub fn build(self) -> AnomalyConfig {
        self.config
    }
}

impl Default for AnomalyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub forecast: ForecastConfig,
    pub anomaly: AnomalyConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            other => Err(Error::Config(format!(
                "unsupported configuration format: {:?}",
                other
            ))),
        }
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.forecast.validate()?;
        self.anomaly.validate()
    }
}
