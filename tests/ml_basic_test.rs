//! Basic tests of the machine learning building blocks

use kpi_analytics::ml::models::{
    DecisionTreeConfig, DecisionTreeRegressor, GradientBoostingConfig,
    GradientBoostingConfigBuilder, GradientBoostingRegressor, RandomForestConfigBuilder,
    RandomForestRegressor, Regressor,
};
use kpi_analytics::ml::{IsolationForest, StandardScaler, Transformer};
use kpi_analytics::Error;

fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
    let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (i % 3) as f64]).collect();
    let y: Vec<f64> = (0..30).map(|i| if i < 15 { 1.0 } else { 5.0 }).collect();
    (x, y)
}

#[test]
fn test_standard_scaler() {
    let data = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]];
    let mut scaler = StandardScaler::new();
    let transformed = scaler.fit_transform(&data).unwrap();

    let values: Vec<f64> = transformed.iter().map(|r| r[0]).collect();
    let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
    assert!(mean.abs() < 1e-10);
    assert!((values[4] - 2f64.sqrt()).abs() < 1e-10);
    assert_eq!(scaler.means(), &[3.0]);
}

#[test]
fn test_every_regressor_learns_a_step() {
    let (x, y) = step_data();
    let mut models: Vec<Box<dyn Regressor>> = vec![
        Box::new(DecisionTreeRegressor::new(DecisionTreeConfig {
            max_depth: Some(3),
        })),
        Box::new(RandomForestRegressor::new(
            RandomForestConfigBuilder::new()
                .n_estimators(25)
                .random_seed(1)
                .build(),
        )),
        Box::new(GradientBoostingRegressor::new(
            GradientBoostingConfigBuilder::new().n_estimators(50).build(),
        )),
        Box::new(GradientBoostingRegressor::new(
            GradientBoostingConfigBuilder::new()
                .n_estimators(50)
                .quantile(0.5)
                .build(),
        )),
    ];

    for model in models.iter_mut() {
        assert!(!model.is_fitted());
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        assert!(model.predict_one(&[2.0, 2.0]).unwrap() < 3.0, "{:?}", model);
        assert!(model.predict_one(&[27.0, 0.0]).unwrap() > 3.0, "{:?}", model);
    }
}

#[test]
fn test_regressor_input_checks() {
    let mut model = GradientBoostingRegressor::new(GradientBoostingConfig::default());
    assert!(matches!(
        model.fit(&[vec![1.0], vec![2.0]], &[1.0]),
        Err(Error::LengthMismatch { .. })
    ));
    assert!(matches!(model.fit(&[], &[]), Err(Error::InvalidInput(_))));

    let (x, y) = step_data();
    model.fit(&x, &y).unwrap();
    assert!(matches!(
        model.predict_one(&[1.0]),
        Err(Error::LengthMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_isolation_forest_scores() {
    let mut data: Vec<Vec<f64>> = (0..50).map(|i| vec![(i % 10) as f64 / 10.0]).collect();
    data.push(vec![12.0]);

    let mut forest = IsolationForest::new(100, 0.02, 42).unwrap();
    let labels = forest.fit_predict(&data).unwrap();
    assert!(labels[50]);
    assert!(labels.iter().filter(|&&l| l).count() <= 2);
    assert!(forest.anomaly_scores().iter().all(|&s| s > 0.0 && s <= 1.0));
}
