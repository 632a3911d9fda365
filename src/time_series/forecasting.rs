//! Ensemble forecasting of quarterly KPI series
//!
//! [`KpiForecaster`] fits a point model and a confidence band on time-based
//! features, then rolls forecasts forward one quarter at a time, feeding each
//! prediction back in as the newest lag.

use crate::config::{ForecastConfig, ModelType, MIN_FORECAST_POINTS};
use crate::error::{Error, Result};
use crate::ml::models::{
    GradientBoostingConfigBuilder, GradientBoostingRegressor, RandomForestConfigBuilder,
    RandomForestRegressor, Regressor,
};
use crate::ml::pipeline::Transformer;
use crate::ml::preprocessing::StandardScaler;
use crate::series::{sorted_by_period, validate_quarters, values, Observation, Period};
use crate::stats::descriptive::{round_to, sample_std, sample_variance};
use crate::time_series::features::{build_features, rollout_row, YearBounds, FEATURE_COLUMNS};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Depth of every gradient-boosting stage
const GB_MAX_DEPTH: usize = 4;
const GB_LEARNING_RATE: f64 = 0.1;
/// Depth limit of random-forest trees
const RF_MAX_DEPTH: usize = 6;
/// Share of the training standard deviation used by the fixed-width band
const FALLBACK_STD_FACTOR: f64 = 0.5;
/// Two-sided 95% normal quantile
const BAND_Z: f64 = 1.96;
/// Decimal places kept in forecast output
const OUTPUT_DECIMALS: i32 = 4;

/// One forecast quarter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub quarter: u8,
    pub predicted_value: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
}

impl ForecastPoint {
    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            quarter: self.quarter,
        }
    }
}

/// A forecast quarter tagged with its KPI, region, and model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub kpi_id: String,
    pub region_id: String,
    pub year: i32,
    pub quarter: u8,
    pub predicted_value: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub model_type: ModelType,
}

impl ForecastResult {
    pub fn from_point(
        kpi_id: &str,
        region_id: &str,
        model_type: ModelType,
        point: &ForecastPoint,
    ) -> Self {
        ForecastResult {
            kpi_id: kpi_id.to_string(),
            region_id: region_id.to_string(),
            year: point.year,
            quarter: point.quarter,
            predicted_value: point.predicted_value,
            confidence_lower: point.confidence_lower,
            confidence_upper: point.confidence_upper,
            model_type,
        }
    }
}

/// Trained point estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PointModel {
    GradientBoosting(GradientBoostingRegressor),
    RandomForest(RandomForestRegressor),
}

impl PointModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            PointModel::GradientBoosting(_) => ModelType::GradientBoosting,
            PointModel::RandomForest(_) => ModelType::RandomForest,
        }
    }

    pub fn predict_one(&self, row: &[f64]) -> Result<f64> {
        match self {
            PointModel::GradientBoosting(model) => model.predict_one(row),
            PointModel::RandomForest(model) => model.predict_one(row),
        }
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            PointModel::GradientBoosting(model) => model.feature_importances(),
            PointModel::RandomForest(model) => model.feature_importances(),
        }
    }
}

/// How the confidence band around a point prediction is produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IntervalModel {
    /// Lower and upper quantile regressors, used as-is
    Quantile {
        lower: GradientBoostingRegressor,
        upper: GradientBoostingRegressor,
    },
    /// `point ± half_width`
    FixedWidth { half_width: f64 },
}

impl IntervalModel {
    fn bounds(&self, row: &[f64], point: f64) -> Result<(f64, f64)> {
        match self {
            IntervalModel::Quantile { lower, upper } => {
                Ok((lower.predict_one(row)?, upper.predict_one(row)?))
            }
            IntervalModel::FixedWidth { half_width } => {
                Ok((point - half_width, point + half_width))
            }
        }
    }
}

/// Everything a successful fit produced
///
/// Immutable once built; forecasting only reads it, so one fitted state can
/// serve any number of rollouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedForecaster {
    scaler: StandardScaler,
    point: PointModel,
    interval: IntervalModel,
    last_features: Vec<f64>,
    last_period: Period,
    last_value: f64,
    history: Vec<f64>,
    bounds: YearBounds,
    training_std: f64,
}

impl FittedForecaster {
    pub fn model_type(&self) -> ModelType {
        self.point.model_type()
    }

    pub fn last_period(&self) -> Period {
        self.last_period
    }

    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    /// Unscaled feature row of the last training observation
    pub fn last_features(&self) -> &[f64] {
        &self.last_features
    }

    /// Training values in period order
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn year_bounds(&self) -> YearBounds {
        self.bounds
    }

    /// Sample standard deviation of the training values
    pub fn training_std(&self) -> f64 {
        self.training_std
    }

    /// Start a rollout that first predicts the quarter after `start`
    pub fn rollout(&self, start: Period) -> RolloutState {
        RolloutState {
            history: self.history.clone(),
            period: start,
        }
    }

    /// Forecast `quarters_ahead` quarters following `start` (default: last training quarter)
    pub fn forecast(
        &self,
        quarters_ahead: usize,
        start: Option<Period>,
    ) -> Result<Vec<ForecastPoint>> {
        let start = match start {
            Some(period) => Period::new(period.year, period.quarter)?,
            None => self.last_period,
        };

        let mut state = self.rollout(start);
        let mut points = Vec::with_capacity(quarters_ahead);
        for _ in 0..quarters_ahead {
            points.push(state.step(self)?);
        }
        Ok(points)
    }

    fn predict_row(&self, row: &[f64]) -> Result<(f64, f64, f64)> {
        let scaled = self.scaler.transform_row(row)?;
        let point = self.point.predict_one(&scaled)?;
        let (lower, upper) = self.interval.bounds(&scaled, point)?;
        Ok((point, lower, upper))
    }
}

/// Position of an autoregressive rollout
///
/// `history` holds the training values followed by every prediction made so
/// far; `period` is the last quarter covered by `history`.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutState {
    pub history: Vec<f64>,
    pub period: Period,
}

impl RolloutState {
    /// Predict the next quarter and append the point prediction to the history
    pub fn step(&mut self, model: &FittedForecaster) -> Result<ForecastPoint> {
        self.period = self.period.next();
        let row = rollout_row(self.period, model.bounds, &self.history);
        let (point, lower, upper) = model.predict_row(&row)?;

        if lower > upper {
            debug!(
                "Quantile band crossed at {}: lower {:.4} > upper {:.4}",
                self.period, lower, upper
            );
        }
        debug!(
            "Forecast {}: {:.4} [{:.4}, {:.4}]",
            self.period, point, lower, upper
        );

        self.history.push(point);
        Ok(ForecastPoint {
            year: self.period.year,
            quarter: self.period.quarter,
            predicted_value: round_to(point, OUTPUT_DECIMALS),
            confidence_lower: round_to(lower, OUTPUT_DECIMALS),
            confidence_upper: round_to(upper, OUTPUT_DECIMALS),
        })
    }
}

/// KPI forecasting engine built on tree ensembles
///
/// ```
/// use kpi_analytics::config::ForecastConfig;
/// use kpi_analytics::series::{quarterly_series, Period};
/// use kpi_analytics::time_series::KpiForecaster;
///
/// let values: Vec<f64> = (0..10).map(|i| 70.0 + 2.0 * i as f64).collect();
/// let series = quarterly_series(Period::new(2022, 1).unwrap(), &values);
///
/// let mut forecaster = KpiForecaster::new(ForecastConfig::default());
/// let forecast = forecaster.fit(&series).unwrap().predict(4, None).unwrap();
/// assert_eq!(forecast.len(), 4);
/// assert_eq!((forecast[0].year, forecast[0].quarter), (2024, 3));
/// ```
#[derive(Debug, Clone)]
pub struct KpiForecaster {
    config: ForecastConfig,
    fitted: Option<FittedForecaster>,
}

impl KpiForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        KpiForecaster {
            config,
            fitted: None,
        }
    }

    /// Wrap a fitted state restored from storage
    pub fn from_fitted(config: ForecastConfig, fitted: FittedForecaster) -> Self {
        KpiForecaster {
            config,
            fitted: Some(fitted),
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted(&self) -> Option<&FittedForecaster> {
        self.fitted.as_ref()
    }

    /// Fit on a quarterly series
    ///
    /// The series is sorted by period first. On error the previously fitted
    /// state, if any, is left untouched.
    pub fn fit(&mut self, series: &[Observation]) -> Result<&mut Self> {
        self.config.validate()?;
        validate_training_series(series)?;

        let sorted = sorted_by_period(series);
        let mut matrix = build_features(&sorted);
        let replaced = matrix.zero_fill_non_finite();
        if replaced > 0 {
            warn!("Replaced {} non-finite feature values with 0", replaced);
        }

        let mut scaler = StandardScaler::new();
        let x = scaler.fit_transform(&matrix.rows)?;
        let y = &matrix.target;

        let (point, interval) = match self.config.model_type {
            ModelType::GradientBoosting => {
                let builder = || {
                    GradientBoostingConfigBuilder::new()
                        .n_estimators(self.config.n_estimators)
                        .max_depth(GB_MAX_DEPTH)
                        .learning_rate(GB_LEARNING_RATE)
                };
                let alpha = self.config.alpha();

                let mut point = GradientBoostingRegressor::new(builder().build());
                let mut lower = GradientBoostingRegressor::new(builder().quantile(alpha).build());
                let mut upper =
                    GradientBoostingRegressor::new(builder().quantile(1.0 - alpha).build());
                point.fit(&x, y)?;
                lower.fit(&x, y)?;
                upper.fit(&x, y)?;

                (
                    PointModel::GradientBoosting(point),
                    IntervalModel::Quantile { lower, upper },
                )
            }
            ModelType::RandomForest => {
                let config = RandomForestConfigBuilder::new()
                    .n_estimators(self.config.n_estimators)
                    .max_depth(RF_MAX_DEPTH)
                    .random_seed(self.config.random_state)
                    .build();
                let mut point = RandomForestRegressor::new(config);
                point.fit(&x, y)?;

                let std = sample_std(y).unwrap_or(0.0) * FALLBACK_STD_FACTOR;
                (
                    PointModel::RandomForest(point),
                    IntervalModel::FixedWidth {
                        half_width: BAND_Z * std,
                    },
                )
            }
        };

        let last = sorted
            .last()
            .ok_or_else(|| Error::InvalidInput("empty series".to_string()))?;
        let fitted = FittedForecaster {
            scaler,
            point,
            interval,
            last_features: matrix.rows.last().cloned().unwrap_or_default(),
            last_period: last.period(),
            last_value: last.value,
            history: values(&sorted),
            bounds: matrix.bounds,
            training_std: sample_std(y).unwrap_or(0.0),
        };

        info!(
            "Fitted {} forecaster on {} quarters ({} to {})",
            self.config.model_type,
            sorted.len(),
            sorted[0].period(),
            last.period()
        );
        self.fitted = Some(fitted);
        Ok(self)
    }

    /// Forecast `quarters_ahead` quarters
    ///
    /// Forecasting starts with the quarter after `start`, which defaults to the
    /// last observed quarter.
    pub fn predict(
        &self,
        quarters_ahead: usize,
        start: Option<Period>,
    ) -> Result<Vec<ForecastPoint>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            Error::ModelNotFitted(
                "Model must be fitted before prediction. Call fit() first.".to_string(),
            )
        })?;
        fitted.forecast(quarters_ahead, start)
    }

    /// Point-model importances paired with their feature names
    pub fn feature_importances(&self) -> Option<Vec<(&'static str, f64)>> {
        let importances = self.fitted.as_ref()?.point.feature_importances()?;
        Some(
            FEATURE_COLUMNS
                .iter()
                .copied()
                .zip(importances.iter().copied())
                .collect(),
        )
    }
}

/// Checks run before any feature is built, in reporting order
fn validate_training_series(series: &[Observation]) -> Result<()> {
    if series.len() < MIN_FORECAST_POINTS {
        return Err(Error::InsufficientData {
            required: MIN_FORECAST_POINTS,
            actual: series.len(),
        });
    }

    // NaN rows are skipped here; an infinite value yields a non-finite variance
    let present: Vec<f64> = series
        .iter()
        .map(|o| o.value)
        .filter(|v| !v.is_nan())
        .collect();
    if sample_variance(&present) == Some(0.0) {
        return Err(Error::ConstantSeries(
            "Cannot forecast constant series (zero variance). All values are identical, no pattern to learn."
                .to_string(),
        ));
    }

    if series.iter().any(|o| o.value.is_nan()) {
        return Err(Error::Data(
            "Data contains NaN values. Please clean data before forecasting.".to_string(),
        ));
    }
    if series.iter().any(|o| o.value.is_infinite()) {
        return Err(Error::Data(
            "Data contains infinite values. Please clean data before forecasting.".to_string(),
        ));
    }

    validate_quarters(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfigBuilder;
    use crate::series::quarterly_series;

    fn trend_series() -> Vec<Observation> {
        let values: Vec<f64> = (0..10).map(|i| 70.0 + 2.0 * i as f64).collect();
        quarterly_series(Period { year: 2022, quarter: 1 }, &values)
    }

    fn small_config(model_type: ModelType) -> ForecastConfig {
        ForecastConfigBuilder::new()
            .model_type(model_type)
            .n_estimators(30)
            .build()
    }

    #[test]
    fn test_forecast_periods_continue_series() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        let points = forecaster.fit(&trend_series()).unwrap().predict(6, None).unwrap();

        let periods: Vec<(i32, u8)> = points.iter().map(|p| (p.year, p.quarter)).collect();
        assert_eq!(
            periods,
            vec![(2024, 3), (2024, 4), (2025, 1), (2025, 2), (2025, 3), (2025, 4)]
        );
        assert!(points.iter().all(|p| p.predicted_value.is_finite()));
    }

    #[test]
    fn test_custom_start_period() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::RandomForest));
        forecaster.fit(&trend_series()).unwrap();
        let points = forecaster
            .predict(2, Some(Period { year: 2030, quarter: 4 }))
            .unwrap();
        assert_eq!((points[0].year, points[0].quarter), (2031, 1));
        assert_eq!((points[1].year, points[1].quarter), (2031, 2));

        let bad = forecaster.predict(1, Some(Period { year: 2030, quarter: 7 }));
        assert!(matches!(bad, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_random_forest_band_is_symmetric() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::RandomForest));
        forecaster.fit(&trend_series()).unwrap();
        let fitted = forecaster.fitted().unwrap();
        let half_width = BAND_Z * fitted.training_std() * FALLBACK_STD_FACTOR;

        for point in forecaster.predict(4, None).unwrap() {
            let upper_gap = point.confidence_upper - point.predicted_value;
            let lower_gap = point.predicted_value - point.confidence_lower;
            assert!((upper_gap - half_width).abs() < 1e-3);
            assert!((lower_gap - half_width).abs() < 1e-3);
        }
    }

    #[test]
    fn test_gradient_boosting_band_comes_from_quantile_models() {
        let noise = [3.0, -4.0, 1.5, 5.0, -2.5, -5.5, 2.0];
        let values: Vec<f64> = (0..24)
            .map(|i| 100.0 + 1.5 * i as f64 + noise[i % noise.len()])
            .collect();
        let series = quarterly_series(Period { year: 2018, quarter: 1 }, &values);
        let mut forecaster = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        forecaster.fit(&series).unwrap();
        let fitted = forecaster.fitted().unwrap();
        let IntervalModel::Quantile { lower, upper } = &fitted.interval else {
            panic!("gradient boosting should carry quantile models");
        };

        let mut state = fitted.rollout(fitted.last_period());
        for _ in 0..4 {
            let row = rollout_row(state.period.next(), fitted.bounds, &state.history);
            let scaled = fitted.scaler.transform_row(&row).unwrap();
            let expected_lower = round_to(lower.predict_one(&scaled).unwrap(), OUTPUT_DECIMALS);
            let expected_upper = round_to(upper.predict_one(&scaled).unwrap(), OUTPUT_DECIMALS);

            let point = state.step(fitted).unwrap();
            assert_eq!(point.confidence_lower, expected_lower);
            assert_eq!(point.confidence_upper, expected_upper);
            assert_ne!(point.confidence_lower, point.predicted_value);
            assert_ne!(point.confidence_upper, point.predicted_value);
        }
    }

    #[test]
    fn test_validation_order() {
        let mut forecaster = KpiForecaster::new(ForecastConfig::default());

        let short = quarterly_series(Period { year: 2022, quarter: 1 }, &[1.0, 2.0, 3.0]);
        assert!(matches!(
            forecaster.fit(&short),
            Err(Error::InsufficientData {
                required: 4,
                actual: 3
            })
        ));

        let flat = quarterly_series(Period { year: 2022, quarter: 1 }, &[5.0; 6]);
        assert!(matches!(
            forecaster.fit(&flat),
            Err(Error::ConstantSeries(_))
        ));

        // Constant apart from the NaN: the variance check sees only the 5s
        let flat_nan =
            quarterly_series(Period { year: 2022, quarter: 1 }, &[5.0, f64::NAN, 5.0, 5.0, 5.0]);
        assert!(matches!(
            forecaster.fit(&flat_nan),
            Err(Error::ConstantSeries(_))
        ));

        let with_inf =
            quarterly_series(Period { year: 2022, quarter: 1 }, &[5.0, f64::INFINITY, 5.0, 5.0]);
        assert!(matches!(forecaster.fit(&with_inf), Err(Error::Data(_))));

        let mut bad_quarter = trend_series();
        bad_quarter[3].quarter = 5;
        assert!(matches!(
            forecaster.fit(&bad_quarter),
            Err(Error::InvalidInput(_))
        ));
        assert!(!forecaster.is_fitted());
    }

    #[test]
    fn test_failed_fit_keeps_previous_state() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        forecaster.fit(&trend_series()).unwrap();
        let before = forecaster.predict(2, None).unwrap();

        assert!(forecaster.fit(&trend_series()[..2]).is_err());
        assert!(forecaster.is_fitted());
        assert_eq!(forecaster.predict(2, None).unwrap(), before);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut shuffled = trend_series();
        shuffled.reverse();
        let mut a = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        let mut b = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        a.fit(&shuffled).unwrap();
        b.fit(&trend_series()).unwrap();
        assert_eq!(a.predict(3, None).unwrap(), b.predict(3, None).unwrap());
    }

    #[test]
    fn test_feature_importances_named() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        assert!(forecaster.feature_importances().is_none());
        forecaster.fit(&trend_series()).unwrap();
        let importances = forecaster.feature_importances().unwrap();
        assert_eq!(importances.len(), FEATURE_COLUMNS.len());
        assert_eq!(importances[0].0, "time_idx");
    }

    #[test]
    fn test_rollout_state_steps() {
        let mut forecaster = KpiForecaster::new(small_config(ModelType::GradientBoosting));
        forecaster.fit(&trend_series()).unwrap();
        let fitted = forecaster.fitted().unwrap();

        let mut state = fitted.rollout(fitted.last_period());
        let first = state.step(fitted).unwrap();
        assert_eq!(state.history.len(), 11);
        assert_eq!(state.period, first.period());
        assert_eq!(fitted.history().len(), 10);
    }
}
