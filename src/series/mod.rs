//! Quarterly KPI observations
//!
//! A KPI series is a slice of [`Observation`]s for one indicator/region pair,
//! ordered ascending by (year, quarter) with one observation per period.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar quarter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    /// Create a period, rejecting quarters outside 1..=4
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(Error::InvalidInput(format!(
                "quarter must be in 1..=4, got {}",
                quarter
            )));
        }
        Ok(Period { year, quarter })
    }

    /// The following quarter; Q4 rolls over into Q1 of the next year
    pub fn next(self) -> Self {
        if self.quarter >= 4 {
            Period {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Period {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }

    /// First calendar day of the quarter
    pub fn start_date(&self) -> Option<NaiveDate> {
        let month = u32::from(self.quarter.clamp(1, 4)) * 3 - 2;
        NaiveDate::from_ymd_opt(self.year, month, 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// One KPI value for one quarter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub quarter: u8,
    pub value: f64,
}

impl Observation {
    pub fn new(year: i32, quarter: u8, value: f64) -> Self {
        Observation {
            year,
            quarter,
            value,
        }
    }

    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            quarter: self.quarter,
        }
    }
}

/// Build a consecutive quarterly series starting at `start`
///
/// ```
/// use kpi_analytics::series::{quarterly_series, Period};
///
/// let series = quarterly_series(Period::new(2023, 4).unwrap(), &[1.0, 2.0]);
/// assert_eq!(series[1].year, 2024);
/// assert_eq!(series[1].quarter, 1);
/// ```
pub fn quarterly_series(start: Period, values: &[f64]) -> Vec<Observation> {
    let mut period = start;
    let mut series = Vec::with_capacity(values.len());
    for &value in values {
        series.push(Observation::new(period.year, period.quarter, value));
        period = period.next();
    }
    series
}

/// Check that every observation carries a quarter in 1..=4
pub fn validate_quarters(series: &[Observation]) -> Result<()> {
    match series.iter().find(|o| !(1..=4).contains(&o.quarter)) {
        Some(bad) => Err(Error::InvalidInput(format!(
            "quarter must be in 1..=4, got {} for year {}",
            bad.quarter, bad.year
        ))),
        None => Ok(()),
    }
}

/// Copy of the series sorted ascending by (year, quarter)
pub fn sorted_by_period(series: &[Observation]) -> Vec<Observation> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|o| o.period());
    sorted
}

/// Extract the value column
pub fn values(series: &[Observation]) -> Vec<f64> {
    series.iter().map(|o| o.value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_next_wraps_year() {
        let p = Period::new(2024, 3).unwrap();
        assert_eq!(p.next(), Period::new(2024, 4).unwrap());
        assert_eq!(p.next().next(), Period::new(2025, 1).unwrap());
    }

    #[test]
    fn test_period_rejects_bad_quarter() {
        assert!(Period::new(2024, 0).is_err());
        assert!(Period::new(2024, 5).is_err());
    }

    #[test]
    fn test_period_start_date_and_display() {
        let p = Period::new(2024, 3).unwrap();
        assert_eq!(p.start_date(), NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(p.to_string(), "2024Q3");
    }

    #[test]
    fn test_sorted_by_period() {
        let series = vec![
            Observation::new(2023, 2, 3.0),
            Observation::new(2022, 4, 1.0),
            Observation::new(2023, 1, 2.0),
        ];
        let sorted = sorted_by_period(&series);
        assert_eq!(values(&sorted), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_validate_quarters() {
        let good = quarterly_series(Period::new(2022, 1).unwrap(), &[1.0, 2.0, 3.0]);
        assert!(validate_quarters(&good).is_ok());
        let bad = vec![Observation::new(2022, 7, 1.0)];
        assert!(validate_quarters(&bad).is_err());
    }
}
