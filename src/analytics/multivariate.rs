//! Whole-series anomaly audit with an isolation forest
//!
//! Unlike the z-score detector this looks at every observation at once, so a
//! point can be flagged because of values that came after it. It is meant for
//! re-auditing a complete history, not for live monitoring.

use crate::analytics::alerts::{isolation_description, Direction, Severity};
use crate::analytics::AnomalyResult;
use crate::config::{validate_contamination, AnomalyConfig};
use crate::error::Result;
use crate::ml::anomaly_detection::IsolationForest;
use crate::ml::pipeline::Transformer;
use crate::ml::preprocessing::StandardScaler;
use crate::series::Observation;
use crate::stats::descriptive::{mean, sample_std};
use log::{debug, info, warn};

/// Isolation-forest detector over `[year, quarter, value]`
#[derive(Debug, Clone)]
pub struct MultivariateDetector {
    config: AnomalyConfig,
}

impl MultivariateDetector {
    /// Build a detector; the configuration is validated first
    pub fn new(config: AnomalyConfig) -> Result<Self> {
        config.validate()?;
        Ok(MultivariateDetector { config })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Flag observations the forest isolates unusually fast
    ///
    /// `contamination` overrides the configured outlier share. An empty series
    /// yields no anomalies whatever the override. Results keep the input order.
    /// Rows with a non-finite value are left out of the audit.
    pub fn detect(
        &self,
        series: &[Observation],
        kpi_id: &str,
        region_id: &str,
        contamination: Option<f64>,
    ) -> Result<Vec<AnomalyResult>> {
        if series.is_empty() {
            return Ok(Vec::new());
        }
        let contamination = contamination.unwrap_or(self.config.contamination);
        validate_contamination(contamination)?;

        let rows: Vec<Observation> = series
            .iter()
            .filter(|o| o.value.is_finite())
            .copied()
            .collect();
        if rows.len() < series.len() {
            warn!(
                "Dropped {} non-finite values from {}/{} before isolation audit",
                series.len() - rows.len(),
                kpi_id,
                region_id
            );
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let features: Vec<Vec<f64>> = rows
            .iter()
            .map(|o| vec![f64::from(o.year), f64::from(o.quarter), o.value])
            .collect();
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&features)?;

        let mut forest = IsolationForest::new(
            self.config.isolation_estimators,
            contamination,
            self.config.random_state,
        )?;
        let outliers = forest.fit_predict(&scaled)?;

        let values: Vec<f64> = rows.iter().map(|o| o.value).collect();
        let mean_val = mean(&values).unwrap_or(0.0);
        let std_val = match sample_std(&values) {
            Some(std) if std != 0.0 && std.is_finite() => std,
            _ => 1.0,
        };

        let mut anomalies = Vec::new();
        for (obs, _) in rows.iter().zip(&outliers).filter(|(_, flag)| **flag) {
            let z_score = (obs.value - mean_val) / std_val;
            let direction = Direction::from_value(obs.value, mean_val);
            let severity = if z_score.abs() >= self.config.critical_threshold {
                Severity::Critical
            } else {
                Severity::Warning
            };

            debug!(
                "Isolation outlier in {}/{} at {}: z = {:.2}",
                kpi_id,
                region_id,
                obs.period(),
                z_score
            );
            anomalies.push(AnomalyResult::new(
                kpi_id,
                region_id,
                obs.period(),
                obs.value,
                mean_val,
                z_score,
                severity,
                direction,
                isolation_description(direction, z_score),
            ));
        }

        info!(
            "Isolation audit flagged {} of {} points for {}/{}",
            anomalies.len(),
            rows.len(),
            kpi_id,
            region_id
        );
        Ok(anomalies)
    }
}
