//! Common test utilities module
//!
//! Shared KPI series fixtures for the integration tests.

#![allow(dead_code)]

use kpi_analytics::series::{quarterly_series, Observation, Period};

/// `[70, 72, ..., 88]` over 2022Q1..2024Q2
pub fn linear_series() -> Vec<Observation> {
    let values: Vec<f64> = (0..10).map(|i| 70.0 + 2.0 * i as f64).collect();
    quarterly_series(Period { year: 2022, quarter: 1 }, &values)
}

/// `[70, 72, ..., 86]` with the ninth value replaced by 150
pub fn spiked_series() -> Vec<Observation> {
    let mut values: Vec<f64> = (0..9).map(|i| 70.0 + 2.0 * i as f64).collect();
    values[8] = 150.0;
    quarterly_series(Period { year: 2022, quarter: 1 }, &values)
}

/// Trend with a repeating quarterly pattern
pub fn seasonal_series(n_quarters: usize) -> Vec<Observation> {
    let values: Vec<f64> = (0..n_quarters)
        .map(|i| 100.0 + 1.5 * i as f64 + [4.0, -2.0, 3.0, -5.0][i % 4])
        .collect();
    quarterly_series(Period { year: 2018, quarter: 1 }, &values)
}

pub fn constant_series(n_quarters: usize, value: f64) -> Vec<Observation> {
    quarterly_series(Period { year: 2022, quarter: 1 }, &vec![value; n_quarters])
}
