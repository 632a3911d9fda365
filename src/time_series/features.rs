//! Time-based feature engineering for quarterly KPI series
//!
//! Every observation becomes one row of [`FEATURE_COLUMNS`]. Training rows are
//! built in one pass over the history with [`build_features`]; forecast rows are
//! built one at a time from a growing history with [`rollout_row`].

use crate::series::{Observation, Period};
use crate::stats::descriptive::{mean, population_std, sample_std};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Feature column names, in matrix order
pub const FEATURE_COLUMNS: [&str; 11] = [
    "time_idx",
    "quarter_sin",
    "quarter_cos",
    "year_norm",
    "lag_1",
    "lag_2",
    "lag_4",
    "rolling_mean_4",
    "rolling_std_4",
    "diff_1",
    "diff_4",
];

/// Number of feature columns
pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// Trailing window for the rolling features
const ROLLING_WINDOW: usize = 4;

/// Year range seen at training time
///
/// Forecast rows keep using the training bounds, so `year_norm` can exceed 1.0
/// once the rollout passes the last training year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearBounds {
    pub min_year: i32,
    pub max_year: i32,
}

impl YearBounds {
    /// Bounds of a series; `None` when it is empty
    pub fn of(series: &[Observation]) -> Option<Self> {
        let min_year = series.iter().map(|o| o.year).min()?;
        let max_year = series.iter().map(|o| o.year).max()?;
        Some(YearBounds { min_year, max_year })
    }

    /// Quarters since the start of the first training year, 1-based
    pub fn time_idx(&self, period: Period) -> f64 {
        f64::from((period.year - self.min_year) * 4 + i32::from(period.quarter))
    }

    pub fn year_norm(&self, year: i32) -> f64 {
        let span = (self.max_year - self.min_year).max(1);
        f64::from(year - self.min_year) / f64::from(span)
    }
}

/// Training matrix with its target column
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// One row of [`N_FEATURES`] values per observation
    pub rows: Vec<Vec<f64>>,
    /// Observed values
    pub target: Vec<f64>,
    pub bounds: YearBounds,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one named column
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = FEATURE_COLUMNS.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Replace any NaN or infinite cell with 0
    pub fn zero_fill_non_finite(&mut self) -> usize {
        let mut replaced = 0;
        for cell in self.rows.iter_mut().flatten() {
            if !cell.is_finite() {
                *cell = 0.0;
                replaced += 1;
            }
        }
        replaced
    }
}

fn seasonal_terms(quarter: u8) -> (f64, f64) {
    let angle = 2.0 * PI * f64::from(quarter) / 4.0;
    (angle.sin(), angle.cos())
}

/// Build the training feature matrix of a series ordered by period
///
/// Lags and differences that reach before the first row start out missing; each
/// column is then forward-filled, backward-filled, and finally zero-filled. The
/// rolling window includes the current row and needs only one value; its
/// standard deviation is the sample estimate, 0 while undefined.
pub fn build_features(series: &[Observation]) -> FeatureMatrix {
    let bounds = YearBounds::of(series).unwrap_or(YearBounds {
        min_year: 0,
        max_year: 0,
    });
    let values: Vec<f64> = series.iter().map(|o| o.value).collect();
    let present = |v: f64| if v.is_nan() { None } else { Some(v) };
    let shifted = |i: usize, k: usize| i.checked_sub(k).and_then(|j| present(values[j]));

    let n = series.len();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(n); N_FEATURES];

    for (i, obs) in series.iter().enumerate() {
        let (quarter_sin, quarter_cos) = seasonal_terms(obs.quarter);

        let window: Vec<f64> = values[(i + 1).saturating_sub(ROLLING_WINDOW)..=i]
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        let rolling_mean = mean(&window);
        let rolling_std = sample_std(&window).unwrap_or(0.0);

        let current = present(obs.value);
        let diff = |k: usize| Some(current? - shifted(i, k)?);

        let row = [
            Some(bounds.time_idx(obs.period())),
            Some(quarter_sin),
            Some(quarter_cos),
            Some(bounds.year_norm(obs.year)),
            shifted(i, 1),
            shifted(i, 2),
            shifted(i, 4),
            rolling_mean,
            present(rolling_std).or(Some(0.0)),
            diff(1),
            diff(4),
        ];
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell);
        }
    }

    let filled: Vec<Vec<f64>> = columns.iter().map(|c| fill_missing(c)).collect();
    let rows = (0..n)
        .map(|i| filled.iter().map(|column| column[i]).collect())
        .collect();

    FeatureMatrix {
        rows,
        target: values,
        bounds,
    }
}

/// Forward fill, then backward fill, then zero fill
fn fill_missing(column: &[Option<f64>]) -> Vec<f64> {
    let mut out: Vec<Option<f64>> = Vec::with_capacity(column.len());
    let mut last = None;
    for cell in column {
        if cell.is_some() {
            last = *cell;
        }
        out.push(last);
    }

    let mut next = None;
    for cell in out.iter_mut().rev() {
        match cell {
            Some(_) => next = *cell,
            None => *cell = next,
        }
    }

    out.into_iter().map(|cell| cell.unwrap_or(0.0)).collect()
}

/// Build one forecast row for `period` from the values seen so far
///
/// Lags missing from a short history fall back to `lag_1`, and differences that
/// need them are 0. Unlike training rows, the rolling window excludes the row
/// being predicted and uses the population standard deviation.
pub fn rollout_row(period: Period, bounds: YearBounds, history: &[f64]) -> Vec<f64> {
    let n = history.len();
    let lag_1 = history.last().copied().unwrap_or(0.0);
    let lag_2 = if n >= 2 { history[n - 2] } else { lag_1 };
    let lag_4 = if n >= 4 { history[n - 4] } else { lag_1 };

    let recent: &[f64] = if n == 0 {
        &[0.0]
    } else {
        &history[n.saturating_sub(ROLLING_WINDOW)..]
    };
    let rolling_mean = mean(recent).unwrap_or(0.0);
    let rolling_std = population_std(recent)
        .filter(|s| s.is_finite())
        .unwrap_or(0.0);

    let diff_1 = if n >= 2 { lag_1 - lag_2 } else { 0.0 };
    let diff_4 = if n >= 4 { lag_1 - lag_4 } else { 0.0 };
    let (quarter_sin, quarter_cos) = seasonal_terms(period.quarter);

    vec![
        bounds.time_idx(period),
        quarter_sin,
        quarter_cos,
        bounds.year_norm(period.year),
        lag_1,
        lag_2,
        lag_4,
        rolling_mean,
        rolling_std,
        diff_1,
        diff_4,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::quarterly_series;

    fn series(values: &[f64]) -> Vec<Observation> {
        quarterly_series(Period { year: 2022, quarter: 1 }, values)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_calendar_columns() {
        let matrix = build_features(&series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]));
        assert_eq!(matrix.len(), 9);
        assert_eq!(matrix.rows[0].len(), N_FEATURES);

        let time_idx = matrix.column("time_idx").unwrap();
        assert_eq!(time_idx[0], 1.0);
        assert_eq!(time_idx[4], 5.0);
        assert_eq!(time_idx[8], 9.0);

        let year_norm = matrix.column("year_norm").unwrap();
        assert_eq!(year_norm[0], 0.0);
        assert_eq!(year_norm[4], 0.5);
        assert_eq!(year_norm[8], 1.0);

        let sin = matrix.column("quarter_sin").unwrap();
        assert!(close(sin[0], 1.0));
        assert!(close(sin[3], 0.0));
    }

    #[test]
    fn test_lags_are_back_filled() {
        let matrix = build_features(&series(&[10.0, 12.0, 15.0, 11.0, 14.0]));
        let lag_1 = matrix.column("lag_1").unwrap();
        assert_eq!(lag_1, vec![10.0, 10.0, 12.0, 15.0, 11.0]);

        let lag_4 = matrix.column("lag_4").unwrap();
        assert_eq!(lag_4, vec![10.0; 5]);

        let diff_1 = matrix.column("diff_1").unwrap();
        assert_eq!(diff_1, vec![2.0, 2.0, 3.0, -4.0, 3.0]);

        let diff_4 = matrix.column("diff_4").unwrap();
        assert_eq!(diff_4, vec![4.0; 5]);
    }

    #[test]
    fn test_rolling_columns() {
        let matrix = build_features(&series(&[2.0, 4.0, 6.0, 8.0, 10.0]));
        let mean = matrix.column("rolling_mean_4").unwrap();
        assert_eq!(mean, vec![2.0, 3.0, 4.0, 5.0, 7.0]);

        let std = matrix.column("rolling_std_4").unwrap();
        assert_eq!(std[0], 0.0);
        assert!(close(std[1], 2f64.sqrt()));
        assert!(close(std[4], (20.0f64 / 3.0).sqrt()));
    }

    #[test]
    fn test_fill_missing() {
        let filled = fill_missing(&[None, Some(1.0), None, Some(3.0), None]);
        assert_eq!(filled, vec![1.0, 1.0, 1.0, 3.0, 3.0]);
        assert_eq!(fill_missing(&[None, None]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_rollout_row_short_history() {
        let bounds = YearBounds {
            min_year: 2022,
            max_year: 2024,
        };
        let row = rollout_row(Period { year: 2025, quarter: 1 }, bounds, &[5.0]);
        assert_eq!(row[0], 13.0);
        assert_eq!(row[3], 1.5);
        assert_eq!(&row[4..7], &[5.0, 5.0, 5.0]);
        assert_eq!(row[7], 5.0);
        assert_eq!(row[8], 0.0);
        assert_eq!(&row[9..], &[0.0, 0.0]);
    }

    #[test]
    fn test_rollout_row_full_history() {
        let bounds = YearBounds {
            min_year: 2022,
            max_year: 2022,
        };
        let history = [1.0, 2.0, 4.0, 6.0, 8.0];
        let row = rollout_row(Period { year: 2023, quarter: 2 }, bounds, &history);
        assert_eq!(row[4], 8.0);
        assert_eq!(row[5], 6.0);
        assert_eq!(row[6], 2.0);
        assert_eq!(row[7], 5.0);
        assert!(close(row[8], 5f64.sqrt()));
        assert_eq!(row[9], 2.0);
        assert_eq!(row[10], 6.0);
    }
}
