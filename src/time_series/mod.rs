//! Time Series Forecasting Module
//!
//! Feature engineering for quarterly KPI series and the ensemble forecaster
//! that rolls predictions forward from them.
//!
//! # Forecasting Models
//!
//! - Gradient Boosting with quantile-regression confidence bands
//! - Random Forest with a fixed-width band derived from the training spread

pub mod features;
pub mod forecasting;

pub use features::{build_features, rollout_row, FeatureMatrix, YearBounds, FEATURE_COLUMNS, N_FEATURES};
pub use forecasting::{
    FittedForecaster, ForecastPoint, ForecastResult, IntervalModel, KpiForecaster, PointModel,
    RolloutState,
};
