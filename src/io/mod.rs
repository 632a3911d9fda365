//! Tabular input and output
//!
//! Observations are read from CSV; forecasts and anomalies are written as CSV
//! or JSON.

pub mod csv;
pub mod json;

// Re-export commonly used functions
pub use self::csv::{
    read_observations, read_observations_from, write_anomalies_csv, write_csv_to,
    write_forecasts_csv,
};
pub use self::json::{read_json, to_json, write_json};
