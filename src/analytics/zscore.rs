//! Causal z-score anomaly detection
//!
//! Each observation is scored against a baseline made only of earlier
//! observations: a trailing fixed window once enough history exists, otherwise
//! every point seen so far.

use crate::analytics::alerts::{zscore_description, Direction, Severity};
use crate::analytics::AnomalyResult;
use crate::config::{AnomalyConfig, MIN_ANOMALY_POINTS};
use crate::error::Result;
use crate::series::{sorted_by_period, Observation};
use crate::stats::descriptive::{mean, sample_std, sample_variance};
use log::{debug, info, warn};

/// Points needed before the expanding baseline is used
const MIN_BASELINE_POINTS: usize = 2;

/// Univariate z-score detector
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    config: AnomalyConfig,
}

impl ZScoreDetector {
    /// Build a detector; the configuration is validated first
    pub fn new(config: AnomalyConfig) -> Result<Self> {
        config.validate()?;
        Ok(ZScoreDetector { config })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Flag observations whose |z| reaches the warning threshold
    ///
    /// Never fails: short, constant, or entirely non-finite input yields no
    /// anomalies. Results come back in period order.
    pub fn detect(
        &self,
        series: &[Observation],
        kpi_id: &str,
        region_id: &str,
        higher_is_better: bool,
    ) -> Vec<AnomalyResult> {
        if series.len() < MIN_ANOMALY_POINTS {
            debug!(
                "Skipping anomaly detection for {}/{}: {} points",
                kpi_id,
                region_id,
                series.len()
            );
            return Vec::new();
        }

        let present: Vec<f64> = series
            .iter()
            .map(|o| o.value)
            .filter(|v| !v.is_nan())
            .collect();
        if sample_variance(&present) == Some(0.0) {
            debug!(
                "Skipping anomaly detection for {}/{}: constant series",
                kpi_id, region_id
            );
            return Vec::new();
        }

        let finite: Vec<Observation> = series
            .iter()
            .filter(|o| o.value.is_finite())
            .copied()
            .collect();
        if finite.len() < series.len() {
            warn!(
                "Dropped {} non-finite values from {}/{}",
                series.len() - finite.len(),
                kpi_id,
                region_id
            );
        }
        if finite.len() < MIN_ANOMALY_POINTS {
            return Vec::new();
        }

        let sorted = sorted_by_period(&finite);
        let values: Vec<f64> = sorted.iter().map(|o| o.value).collect();
        let mut anomalies = Vec::new();

        for (i, obs) in sorted.iter().enumerate() {
            let Some(window) = self.baseline(&values, i) else {
                continue;
            };
            let (Some(baseline), Some(std)) = (mean(window), sample_std(window)) else {
                continue;
            };
            if std == 0.0 || std.is_nan() {
                continue;
            }

            let z_score = (obs.value - baseline) / std;
            let abs_z = z_score.abs();
            if abs_z < self.config.zscore_threshold {
                continue;
            }

            let severity = Severity::from_z(
                abs_z,
                self.config.zscore_threshold,
                self.config.critical_threshold,
            );
            let direction = Direction::from_z(z_score);
            let deviation_pct = if baseline != 0.0 {
                (obs.value - baseline) / baseline * 100.0
            } else {
                0.0
            };

            debug!(
                "{} anomaly in {}/{} at {}: z = {:.2}",
                severity,
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
                baseline,
                z_score,
                severity,
                direction,
                zscore_description(direction, higher_is_better, deviation_pct, z_score),
            ));
        }

        info!(
            "Z-score detection found {} anomalies in {} points for {}/{}",
            anomalies.len(),
            sorted.len(),
            kpi_id,
            region_id
        );
        anomalies
    }

    /// Baseline values for index `i`, or `None` while there is too little history
    fn baseline<'a>(&self, values: &'a [f64], i: usize) -> Option<&'a [f64]> {
        let window = self.config.rolling_window;
        if self.config.use_rolling_stats && i >= window {
            Some(&values[i - window..i])
        } else if i >= MIN_BASELINE_POINTS {
            Some(&values[..i])
        } else {
            None
        }
    }
}
