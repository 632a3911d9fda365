use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::analytics::AnomalyResult;
use crate::error::Result;
use crate::series::{validate_quarters, Observation};
use crate::time_series::ForecastResult;
use log::debug;

/// One CSV row; extra columns such as `kpi_id` are ignored
#[derive(Debug, Deserialize)]
struct ObservationRecord {
    year: i32,
    quarter: u8,
    value: Option<f64>,
}

/// Read observations from a CSV file with `year`, `quarter` and `value` columns
///
/// An empty `value` cell becomes NaN, which the forecaster rejects and the
/// anomaly detectors skip.
pub fn read_observations<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>> {
    let file = File::open(path.as_ref())?;
    let observations = read_observations_from(file)?;
    debug!(
        "Read {} observations from {}",
        observations.len(),
        path.as_ref().display()
    );
    Ok(observations)
}

/// Read observations from any CSV source
pub fn read_observations_from<R: Read>(reader: R) -> Result<Vec<Observation>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut observations = Vec::new();
    for result in rdr.deserialize::<ObservationRecord>() {
        let record = result?;
        observations.push(Observation::new(
            record.year,
            record.quarter,
            record.value.unwrap_or(f64::NAN),
        ));
    }

    validate_quarters(&observations)?;
    Ok(observations)
}

/// Serialize records as CSV with a header row
pub fn write_csv_to<W: Write, T: Serialize>(writer: W, records: &[T]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write forecast records to a CSV file
pub fn write_forecasts_csv<P: AsRef<Path>>(path: P, forecasts: &[ForecastResult]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv_to(file, forecasts)
}

/// Write anomaly records to a CSV file
pub fn write_anomalies_csv<P: AsRef<Path>>(path: P, anomalies: &[AnomalyResult]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv_to(file, anomalies)
}
