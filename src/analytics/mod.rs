//! KPI anomaly analytics
//!
//! Two detectors produce [`AnomalyResult`] records:
//!
//! - [`ZScoreDetector`]: causal; each point is compared with the points before it
//! - [`MultivariateDetector`]: batch re-audit of a whole series with an isolation forest
//!
//! # Example
//!
//! ```
//! use kpi_analytics::analytics::{Severity, ZScoreDetector};
//! use kpi_analytics::config::AnomalyConfig;
//! use kpi_analytics::series::{quarterly_series, Period};
//!
//! let mut values: Vec<f64> = (0..9).map(|i| 70.0 + 2.0 * i as f64).collect();
//! values[8] = 150.0;
//! let series = quarterly_series(Period::new(2022, 1).unwrap(), &values);
//!
//! let detector = ZScoreDetector::new(AnomalyConfig::default()).unwrap();
//! let anomalies = detector.detect(&series, "gdp_growth", "riyadh", true);
//! assert_eq!(anomalies.len(), 1);
//! assert_eq!(anomalies[0].severity, Severity::Critical);
//! ```

pub mod alerts;
pub mod multivariate;
pub mod zscore;

pub use alerts::{isolation_description, zscore_description, Direction, Severity};
pub use multivariate::MultivariateDetector;
pub use zscore::ZScoreDetector;

use crate::series::Period;
use crate::stats::descriptive::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept in anomaly output
pub(crate) const OUTPUT_DECIMALS: i32 = 4;

/// One flagged observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub kpi_id: String,
    pub region_id: String,
    pub year: i32,
    pub quarter: u8,
    pub actual_value: f64,
    /// Baseline mean the value was compared against
    pub expected_value: f64,
    /// `actual_value - expected_value`
    pub deviation: f64,
    pub z_score: f64,
    pub severity: Severity,
    pub direction: Direction,
    pub description: String,
}

impl AnomalyResult {
    /// Assemble a result, rounding the numeric fields
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        kpi_id: &str,
        region_id: &str,
        period: Period,
        actual: f64,
        expected: f64,
        z_score: f64,
        severity: Severity,
        direction: Direction,
        description: String,
    ) -> Self {
        AnomalyResult {
            kpi_id: kpi_id.to_string(),
            region_id: region_id.to_string(),
            year: period.year,
            quarter: period.quarter,
            actual_value: round_to(actual, OUTPUT_DECIMALS),
            expected_value: round_to(expected, OUTPUT_DECIMALS),
            deviation: round_to(actual - expected, OUTPUT_DECIMALS),
            z_score: round_to(z_score, OUTPUT_DECIMALS),
            severity,
            direction,
            description,
        }
    }

    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            quarter: self.quarter,
        }
    }
}

impl fmt::Display for AnomalyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} {}: {} (actual: {:.2}, expected: {:.2})",
            self.severity,
            self.kpi_id,
            self.region_id,
            self.period(),
            self.description,
            self.actual_value,
            self.expected_value
        )
    }
}
