mod common;

use common::{linear_series, spiked_series};
use kpi_analytics::config::{EngineConfig, ForecastConfigBuilder};
use kpi_analytics::service::{fingerprint, CachedEngine, KpiForecast, ResultCache};
use kpi_analytics::AnomalyResult;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Default)]
struct MemoryCache {
    forecasts: HashMap<String, KpiForecast>,
    anomalies: HashMap<String, Vec<AnomalyResult>>,
    last_ttl: Option<Duration>,
}

impl ResultCache for MemoryCache {
    fn get_forecast(&self, key: &str) -> Option<KpiForecast> {
        self.forecasts.get(key).cloned()
    }

    fn put_forecast(&mut self, key: &str, forecast: &KpiForecast, ttl: Duration) {
        self.forecasts.insert(key.to_string(), forecast.clone());
        self.last_ttl = Some(ttl);
    }

    fn get_anomalies(&self, key: &str) -> Option<Vec<AnomalyResult>> {
        self.anomalies.get(key).cloned()
    }

    fn put_anomalies(&mut self, key: &str, anomalies: &[AnomalyResult], ttl: Duration) {
        self.anomalies.insert(key.to_string(), anomalies.to_vec());
        self.last_ttl = Some(ttl);
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        forecast: ForecastConfigBuilder::new().n_estimators(20).build(),
        ..EngineConfig::default()
    }
}

#[test]
fn test_forecast_is_cached_once() {
    let mut engine = CachedEngine::new(engine_config(), MemoryCache::default())
        .with_ttl(Duration::from_secs(60));

    let first = engine.forecast(&linear_series(), "gdp", "riyadh", 4).unwrap();
    let second = engine.forecast(&linear_series(), "gdp", "riyadh", 4).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.cache().forecasts.len(), 1);
    assert_eq!(engine.cache().last_ttl, Some(Duration::from_secs(60)));

    // A different horizon is a different key
    engine.forecast(&linear_series(), "gdp", "riyadh", 2).unwrap();
    assert_eq!(engine.cache().forecasts.len(), 2);
}

#[test]
fn test_errors_are_not_cached() {
    let mut engine = CachedEngine::new(engine_config(), MemoryCache::default());
    let short: Vec<_> = linear_series().into_iter().take(2).collect();
    assert!(engine.forecast(&short, "gdp", "riyadh", 4).is_err());
    assert!(engine.cache().forecasts.is_empty());
}

#[test]
fn test_cached_result_is_served() {
    let mut engine = CachedEngine::new(engine_config(), MemoryCache::default());
    let fresh = engine.detect(&spiked_series(), "gdp", "riyadh", true).unwrap();
    assert_eq!(fresh.len(), 1);

    // Replace the stored value; the engine must return it without recomputing
    let mut cache = engine.into_cache();
    let key = cache.anomalies.keys().next().cloned().unwrap();
    cache.anomalies.insert(key, Vec::new());

    let mut engine = CachedEngine::new(engine_config(), cache);
    assert!(engine
        .detect(&spiked_series(), "gdp", "riyadh", true)
        .unwrap()
        .is_empty());
}

#[test]
fn test_fingerprint_depends_on_every_input() {
    let base = fingerprint(&(linear_series(), "gdp")).unwrap();
    assert_eq!(base, fingerprint(&(linear_series(), "gdp")).unwrap());
    assert_ne!(base, fingerprint(&(linear_series(), "cpi")).unwrap());
    assert_ne!(base, fingerprint(&(spiked_series(), "gdp")).unwrap());
}
