//! High-level entry points and collaborator seams
//!
//! `forecast_kpi`, `detect_kpi_anomalies` and `audit_kpi_anomalies` wrap the
//! engine for callers that just want records. Persistence and result caching are
//! left to the caller through the [`ModelStore`] and [`ResultCache`] traits; this
//! module only computes keys and checksums for them.

use crate::analytics::{AnomalyResult, MultivariateDetector, ZScoreDetector};
use crate::config::{AnomalyConfig, EngineConfig, ForecastConfig, ModelType};
use crate::error::{Error, Result};
use crate::series::Observation;
use crate::time_series::{FittedForecaster, ForecastResult, KpiForecaster};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Default lifetime of cached results
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Format version written into stored model metadata
pub const MODEL_FORMAT_VERSION: &str = "1.0.0";

/// Forecast for one KPI/region pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiForecast {
    pub kpi_id: String,
    pub region_id: String,
    pub model_type: ModelType,
    pub predictions: Vec<ForecastResult>,
}

/// Fit a forecaster and predict `quarters_ahead` quarters
pub fn forecast_kpi(
    series: &[Observation],
    kpi_id: &str,
    region_id: &str,
    quarters_ahead: usize,
    config: &ForecastConfig,
) -> Result<KpiForecast> {
    let mut forecaster = KpiForecaster::new(config.clone());
    let points = forecaster.fit(series)?.predict(quarters_ahead, None)?;

    let predictions = points
        .iter()
        .map(|p| ForecastResult::from_point(kpi_id, region_id, config.model_type, p))
        .collect();
    Ok(KpiForecast {
        kpi_id: kpi_id.to_string(),
        region_id: region_id.to_string(),
        model_type: config.model_type,
        predictions,
    })
}

/// Causal z-score detection
pub fn detect_kpi_anomalies(
    series: &[Observation],
    kpi_id: &str,
    region_id: &str,
    higher_is_better: bool,
    config: &AnomalyConfig,
) -> Result<Vec<AnomalyResult>> {
    let detector = ZScoreDetector::new(config.clone())?;
    Ok(detector.detect(series, kpi_id, region_id, higher_is_better))
}

/// Whole-series isolation-forest audit with the configured contamination
pub fn audit_kpi_anomalies(
    series: &[Observation],
    kpi_id: &str,
    region_id: &str,
    config: &AnomalyConfig,
) -> Result<Vec<AnomalyResult>> {
    MultivariateDetector::new(config.clone())?.detect(series, kpi_id, region_id, None)
}

/// Hex SHA-256 of the canonical JSON encoding of `value`
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_hex(&bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    result.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Metadata kept next to a persisted forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the serialized model
    pub checksum: String,
    pub n_observations: usize,
}

/// A fitted forecaster together with its integrity metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub metadata: ModelMetadata,
    pub model: FittedForecaster,
}

impl StoredModel {
    /// Package a fitted forecaster, computing its checksum
    pub fn new(model_id: &str, model: FittedForecaster) -> Result<Self> {
        let checksum = fingerprint(&model)?;
        Ok(StoredModel {
            metadata: ModelMetadata {
                model_id: model_id.to_string(),
                model_type: model.model_type(),
                version: MODEL_FORMAT_VERSION.to_string(),
                created_at: Utc::now(),
                checksum,
                n_observations: model.history().len(),
            },
            model,
        })
    }

    /// Recompute the checksum and compare it with the stored one
    pub fn verify(&self) -> Result<()> {
        let actual = fingerprint(&self.model)?;
        if actual != self.metadata.checksum {
            return Err(Error::Data(format!(
                "Model '{}' checksum mismatch. The stored model may be corrupted.",
                self.metadata.model_id
            )));
        }
        Ok(())
    }
}

/// Identifier under which a KPI/region forecaster is stored
pub fn model_id(kpi_id: &str, region_id: &str) -> String {
    format!("forecaster_{}_{}", kpi_id, region_id)
}

/// Storage for fitted forecasters
pub trait ModelStore {
    fn save(&mut self, model: StoredModel) -> Result<()>;

    /// `Ok(None)` when nothing is stored under `model_id`
    fn load(&self, model_id: &str) -> Result<Option<StoredModel>>;
}

/// Persist the fitted state of `forecaster` and return its metadata
pub fn save_forecaster<S: ModelStore + ?Sized>(
    store: &mut S,
    model_id: &str,
    forecaster: &KpiForecaster,
) -> Result<ModelMetadata> {
    let fitted = forecaster.fitted().ok_or_else(|| {
        Error::ModelNotFitted("only fitted forecasters can be saved".to_string())
    })?;
    let stored = StoredModel::new(model_id, fitted.clone())?;
    let metadata = stored.metadata.clone();
    store.save(stored)?;
    info!("Saved forecaster '{}' ({})", model_id, metadata.checksum);
    Ok(metadata)
}

/// Load and verify a forecaster; `Ok(None)` when it is not stored
pub fn load_forecaster<S: ModelStore + ?Sized>(
    store: &S,
    model_id: &str,
    config: ForecastConfig,
) -> Result<Option<KpiForecaster>> {
    let Some(stored) = store.load(model_id)? else {
        return Ok(None);
    };
    stored.verify()?;
    Ok(Some(KpiForecaster::from_fitted(config, stored.model)))
}

/// Memoization of engine outputs, keyed by input fingerprint
///
/// Expiry is the implementor's job; the engine only passes the TTL along.
pub trait ResultCache {
    fn get_forecast(&self, key: &str) -> Option<KpiForecast>;

    fn put_forecast(&mut self, key: &str, forecast: &KpiForecast, ttl: Duration);

    fn get_anomalies(&self, key: &str) -> Option<Vec<AnomalyResult>>;

    fn put_anomalies(&mut self, key: &str, anomalies: &[AnomalyResult], ttl: Duration);
}

#[derive(Serialize)]
struct ForecastKey<'a> {
    kind: &'static str,
    kpi_id: &'a str,
    region_id: &'a str,
    quarters_ahead: usize,
    series: &'a [Observation],
    config: &'a ForecastConfig,
}

#[derive(Serialize)]
struct AnomalyKey<'a> {
    kind: &'static str,
    kpi_id: &'a str,
    region_id: &'a str,
    higher_is_better: bool,
    series: &'a [Observation],
    config: &'a AnomalyConfig,
}

/// Engine front-end that consults a [`ResultCache`] before computing
#[derive(Debug)]
pub struct CachedEngine<C: ResultCache> {
    config: EngineConfig,
    cache: C,
    ttl: Duration,
}

impl<C: ResultCache> CachedEngine<C> {
    pub fn new(config: EngineConfig, cache: C) -> Self {
        CachedEngine {
            config,
            cache,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn into_cache(self) -> C {
        self.cache
    }

    /// Cached [`forecast_kpi`]; errors are never cached
    pub fn forecast(
        &mut self,
        series: &[Observation],
        kpi_id: &str,
        region_id: &str,
        quarters_ahead: usize,
    ) -> Result<KpiForecast> {
        let key = fingerprint(&ForecastKey {
            kind: "forecast",
            kpi_id,
            region_id,
            quarters_ahead,
            series,
            config: &self.config.forecast,
        })?;
        if let Some(hit) = self.cache.get_forecast(&key) {
            debug!("Forecast cache hit for {}/{}", kpi_id, region_id);
            return Ok(hit);
        }

        let forecast = forecast_kpi(
            series,
            kpi_id,
            region_id,
            quarters_ahead,
            &self.config.forecast,
        )?;
        self.cache.put_forecast(&key, &forecast, self.ttl);
        Ok(forecast)
    }

    /// Cached [`detect_kpi_anomalies`]
    pub fn detect(
        &mut self,
        series: &[Observation],
        kpi_id: &str,
        region_id: &str,
        higher_is_better: bool,
    ) -> Result<Vec<AnomalyResult>> {
        let key = fingerprint(&AnomalyKey {
            kind: "zscore",
            kpi_id,
            region_id,
            higher_is_better,
            series,
            config: &self.config.anomaly,
        })?;
        if let Some(hit) = self.cache.get_anomalies(&key) {
            debug!("Anomaly cache hit for {}/{}", kpi_id, region_id);
            return Ok(hit);
        }

        let anomalies =
            detect_kpi_anomalies(series, kpi_id, region_id, higher_is_better, &self.config.anomaly)?;
        self.cache.put_anomalies(&key, &anomalies, self.ttl);
        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfigBuilder;
    use crate::series::{quarterly_series, Period};
    use std::collections::HashMap;

    fn series() -> Vec<Observation> {
        let values: Vec<f64> = (0..10).map(|i| 70.0 + 2.0 * i as f64).collect();
        quarterly_series(Period { year: 2022, quarter: 1 }, &values)
    }

    fn quick_config() -> ForecastConfig {
        ForecastConfigBuilder::new().n_estimators(20).build()
    }

    #[derive(Default)]
    struct MemoryStore {
        models: HashMap<String, StoredModel>,
    }

    impl ModelStore for MemoryStore {
        fn save(&mut self, model: StoredModel) -> Result<()> {
            self.models.insert(model.metadata.model_id.clone(), model);
            Ok(())
        }

        fn load(&self, model_id: &str) -> Result<Option<StoredModel>> {
            Ok(self.models.get(model_id).cloned())
        }
    }

    #[test]
    fn test_forecast_kpi_tags_records() {
        let forecast = forecast_kpi(&series(), "gdp", "riyadh", 3, &quick_config()).unwrap();
        assert_eq!(forecast.predictions.len(), 3);
        assert!(forecast
            .predictions
            .iter()
            .all(|r| r.kpi_id == "gdp" && r.region_id == "riyadh"));
        assert_eq!(forecast.model_type, ModelType::GradientBoosting);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&series()).unwrap();
        let b = fingerprint(&series()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = series();
        changed[0].value += 1.0;
        assert_ne!(a, fingerprint(&changed).unwrap());
    }

    #[test]
    fn test_store_round_trip() {
        let mut forecaster = KpiForecaster::new(quick_config());
        forecaster.fit(&series()).unwrap();
        let expected = forecaster.predict(2, None).unwrap();

        let mut store = MemoryStore::default();
        let id = model_id("gdp", "riyadh");
        let metadata = save_forecaster(&mut store, &id, &forecaster).unwrap();
        assert_eq!(metadata.n_observations, 10);

        let restored = load_forecaster(&store, &id, quick_config())
            .unwrap()
            .unwrap();
        assert_eq!(restored.predict(2, None).unwrap(), expected);
        assert!(load_forecaster(&store, "missing", quick_config())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_tampered_model_fails_verification() {
        let mut forecaster = KpiForecaster::new(quick_config());
        forecaster.fit(&series()).unwrap();
        let mut stored = StoredModel::new("m", forecaster.fitted().unwrap().clone()).unwrap();
        stored.metadata.checksum = "0".repeat(64);
        assert!(matches!(stored.verify(), Err(Error::Data(_))));
    }

    #[test]
    fn test_save_unfitted_fails() {
        let mut store = MemoryStore::default();
        let forecaster = KpiForecaster::new(quick_config());
        assert!(matches!(
            save_forecaster(&mut store, "m", &forecaster),
            Err(Error::ModelNotFitted(_))
        ));
    }
}
