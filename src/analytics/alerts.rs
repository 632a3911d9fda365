//! Severity classification for detected anomalies
//!
//! Maps a z-score onto a severity tier and a direction, and renders the
//! human-readable description attached to each anomaly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Anomaly severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational; below the warning threshold
    Info,
    /// Warning level
    Warning,
    /// Critical level
    Critical,
}

impl Severity {
    /// Tier for an absolute z-score
    pub fn from_z(abs_z: f64, warning: f64, critical: f64) -> Self {
        if abs_z >= critical {
            Severity::Critical
        } else if abs_z >= warning {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the baseline a value falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    High,
    Low,
}

impl Direction {
    /// High for a strictly positive z-score
    pub fn from_z(z: f64) -> Self {
        if z > 0.0 {
            Direction::High
        } else {
            Direction::Low
        }
    }

    /// High when the value is at or above the baseline mean
    pub fn from_value(value: f64, mean: f64) -> Self {
        if value >= mean {
            Direction::High
        } else {
            Direction::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::High => "high",
            Direction::Low => "low",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of a z-score anomaly
///
/// An anomaly is "Positive" when it moves the KPI in its good direction.
pub fn zscore_description(
    direction: Direction,
    higher_is_better: bool,
    deviation_pct: f64,
    z_score: f64,
) -> String {
    let is_good = match direction {
        Direction::High => higher_is_better,
        Direction::Low => !higher_is_better,
    };
    let prefix = if is_good {
        "Positive anomaly"
    } else {
        "Concerning anomaly"
    };
    let side = match direction {
        Direction::High => "above",
        Direction::Low => "below",
    };
    format!(
        "{}: Value is {:.1}% {} expected (Z-score: {:.2})",
        prefix,
        deviation_pct.abs(),
        side,
        z_score
    )
}

/// Description of an isolation-forest anomaly
pub fn isolation_description(direction: Direction, z_score: f64) -> String {
    format!(
        "IsolationForest anomaly: {} deviation (z={:.2})",
        direction, z_score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_z(2.4, 2.5, 3.5), Severity::Info);
        assert_eq!(Severity::from_z(2.5, 2.5, 3.5), Severity::Warning);
        assert_eq!(Severity::from_z(3.5, 2.5, 3.5), Severity::Critical);
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"WARNING\""
        );
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::from_z(0.0), Direction::Low);
        assert_eq!(Direction::from_z(0.1), Direction::High);
        assert_eq!(Direction::from_value(5.0, 5.0), Direction::High);
        assert_eq!(serde_json::to_string(&Direction::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            zscore_description(Direction::High, true, 12.345, 3.14159),
            "Positive anomaly: Value is 12.3% above expected (Z-score: 3.14)"
        );
        assert_eq!(
            zscore_description(Direction::Low, true, -8.0, -2.7),
            "Concerning anomaly: Value is 8.0% below expected (Z-score: -2.70)"
        );
        assert_eq!(
            zscore_description(Direction::Low, false, -8.0, -2.7),
            "Positive anomaly: Value is 8.0% below expected (Z-score: -2.70)"
        );
        assert_eq!(
            isolation_description(Direction::High, 1.234),
            "IsolationForest anomaly: high deviation (z=1.23)"
        );
    }
}
