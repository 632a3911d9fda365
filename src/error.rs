use thiserror::Error;

/// Error type for the forecasting and anomaly engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient data: need at least {required} data points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Constant series: {0}")]
    ConstantSeries(String),

    #[error("Invalid data: {0}")]
    Data(String),

    #[error("Model not fitted: {0}")]
    ModelNotFitted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error")]
    Io(#[source] std::io::Error),

    #[error("CSV error")]
    Csv(#[source] csv::Error),

    #[error("JSON error")]
    Json(#[source] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for API and log consumers
    pub fn code(&self) -> &'static str {
        match self {
            Error::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Error::ConstantSeries(_) => "CONSTANT_SERIES",
            Error::Data(_) => "INVALID_DATA",
            Error::ModelNotFitted(_) => "MODEL_NOT_FITTED",
            Error::InvalidInput(_) | Error::LengthMismatch { .. } => "INVALID_INPUT",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) | Error::Csv(_) | Error::Json(_) => "IO_ERROR",
        }
    }

    /// Whether retrying with the same input could ever succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("invalid TOML: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(format!("invalid YAML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::InsufficientData {
            required: 4,
            actual: 2,
        };
        assert_eq!(err.code(), "INSUFFICIENT_DATA");
        assert_eq!(
            err.to_string(),
            "Insufficient data: need at least 4 data points, got 2"
        );
        assert_eq!(Error::ConstantSeries("x".into()).code(), "CONSTANT_SERIES");
        assert_eq!(Error::Data("x".into()).code(), "INVALID_DATA");
        assert_eq!(Error::ModelNotFitted("x".into()).code(), "MODEL_NOT_FITTED");
        assert!(!err.is_retryable());
    }
}
