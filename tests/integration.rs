//! Integration tests for vigilar.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::uninlined_format_args,
    clippy::cast_lossless,
    clippy::float_cmp,
    clippy::unwrap_used
)]

use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use vigilar::{
    drift::{
        ks_statistic, wasserstein_distance, CalculationMethod, ComputationParams, Method,
        MethodKind, MethodParams, MethodRegistry, UnivariateDriftCalculator,
    },
    quality::{MissingValuesCalculator, UnseenValuesCalculator},
    ArrowDataset, Column, DataPeriod, DriftCalculatorConfig, Error, FeatureType,
    SizeBasedChunker, Threshold,
};

/// Draws `n` samples from N(mean, 1) with a fixed seed.
fn normal_sample(n: usize, mean: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(mean, 1.0).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

fn repeat_labels(counts: &[(&str, usize)]) -> Vec<String> {
    counts
        .iter()
        .flat_map(|(label, n)| std::iter::repeat((*label).to_string()).take(*n))
        .collect()
}

/// Two-sample KS statistic by evaluating both empirical CDFs at every point.
fn naive_ks(a: &[f64], b: &[f64]) -> f64 {
    let cdf = |sample: &[f64], x: f64| {
        sample.iter().filter(|v| **v <= x).count() as f64 / sample.len() as f64
    };
    a.iter()
        .chain(b)
        .map(|x| (cdf(a, *x) - cdf(b, *x)).abs())
        .fold(0.0, f64::max)
}

// ═══════════════════════════════════════════════════════════════════════════════
// End-to-end drift detection
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_end_to_end_normal_shift() {
    let reference = Column::from_f64("x", normal_sample(10_000, 0.0, 7));
    // The default standard deviation band is built from reference chunks that
    // are part of the fitted sample, so it is tight enough to flag an
    // unshifted 1,000 draw chunk for some seeds. A fixed bound keeps this
    // deterministic.
    let method = Method::new(MethodKind::KolmogorovSmirnov)
        .with_threshold(Threshold::constant(None, Some(0.1)));
    let mut fitted = method.fit(&reference, None).unwrap();

    let same = Column::from_f64("x", normal_sample(1_000, 0.0, 11));
    let value = fitted.calculate(&same).unwrap();
    assert!(value < 0.05, "KS on an unshifted sample was {value}");
    assert!(!fitted.alert(value));

    let shifted = Column::from_f64("x", normal_sample(1_000, 3.0, 13));
    let value = fitted.calculate(&shifted).unwrap();
    assert!(value > 0.5, "KS on a shifted sample was {value}");
    assert!(fitted.alert(value));
}

#[test]
fn test_end_to_end_calculator_default_thresholds() {
    let reference = ArrowDataset::from_columns(vec![Column::from_f64(
        "x",
        normal_sample(10_000, 0.0, 21),
    )])
    .unwrap();
    let analysis = ArrowDataset::from_columns(vec![Column::from_f64(
        "x",
        normal_sample(2_000, 3.0, 22),
    )])
    .unwrap();

    let mut fitted = UnivariateDriftCalculator::new(["x"])
        .with_continuous_methods([
            "kolmogorov_smirnov",
            "wasserstein",
            "jensen_shannon",
            "hellinger",
        ])
        .with_chunker(SizeBasedChunker::new(1_000))
        .fit(&reference)
        .unwrap();

    let result = fitted.calculate(&analysis).unwrap();
    assert_eq!(result.len(), (10 + 2) * 4);

    let analysis = result.filter_period(DataPeriod::Analysis);
    assert_eq!(analysis.len(), 8);
    assert!(analysis.records().iter().all(|r| r.alert));

    let wasserstein = analysis.filter("x", "wasserstein");
    assert!(wasserstein
        .records()
        .iter()
        .all(|r| (r.value - 3.0).abs() < 0.2));

    let batch = result.to_record_batch().unwrap();
    assert_eq!(batch.num_rows(), 48);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistic properties
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_ks_auto_resolves_to_exact_and_matches_direct_computation() {
    let reference_values = normal_sample(5_000, 0.0, 31);
    let analysis_values = normal_sample(1_000, 0.2, 32);

    let mut fitted = Method::new(MethodKind::KolmogorovSmirnov)
        .with_chunker(SizeBasedChunker::new(500))
        .fit(&Column::from_f64("x", reference_values.clone()), None)
        .unwrap();
    assert_eq!(fitted.resolved_calculation(), Some(CalculationMethod::Exact));

    let value = fitted
        .calculate(&Column::from_f64("x", analysis_values.clone()))
        .unwrap();
    let direct = naive_ks(&reference_values, &analysis_values);
    assert!((value - direct).abs() < 1e-9);
    assert!((ks_statistic(&reference_values, &analysis_values) - direct).abs() < 1e-9);
}

#[test]
fn test_wasserstein_estimated_converges_to_exact() {
    let reference_values = normal_sample(20_000, 0.0, 41);
    let analysis_values = normal_sample(2_000, 0.5, 42);
    let reference = Column::from_f64("x", reference_values.clone());
    let analysis = Column::from_f64("x", analysis_values.clone());

    let estimated = Method::new(MethodKind::Wasserstein)
        .with_computation_params(ComputationParams {
            calculation_method: CalculationMethod::Estimated,
            n_bins: 100_000,
        })
        .fit(&reference, None)
        .unwrap();
    assert_eq!(
        estimated.resolved_calculation(),
        Some(CalculationMethod::Estimated)
    );

    let exact = Method::new(MethodKind::Wasserstein)
        .with_computation_params(ComputationParams {
            calculation_method: CalculationMethod::Exact,
            n_bins: 100_000,
        })
        .fit(&reference, None)
        .unwrap();

    let estimated_value = estimated.measure(&analysis).unwrap().value;
    let exact_value = exact.measure(&analysis).unwrap().value;
    assert!((estimated_value - exact_value).abs() < 1e-2);
    assert!((exact_value - wasserstein_distance(&reference_values, &analysis_values)).abs() < 1e-9);
}

#[test]
fn test_l_infinity_missing_label_counts_as_zero() {
    let reference = Column::from_strings("c", &repeat_labels(&[("A", 50), ("B", 50)]));
    let mut fitted = Method::new(MethodKind::LInfinity)
        .with_chunker(SizeBasedChunker::new(20))
        .fit(&reference, None)
        .unwrap();

    let analysis = Column::from_strings("c", &repeat_labels(&[("A", 100)]));
    let value = fitted.calculate(&analysis).unwrap();
    assert!((value - 0.5).abs() < 1e-12);
}

#[test]
fn test_chi2_alert_uses_p_value_only() {
    let reference = Column::from_strings("c", &repeat_labels(&[("A", 60), ("B", 40)]));
    let mut fitted = Method::new(MethodKind::Chi2)
        .with_chunker(SizeBasedChunker::new(20))
        .fit(&reference, None)
        .unwrap();

    // no p-value yet: a large statistic alone never alerts
    assert!(!fitted.alert(0.9));
    assert!(!fitted.alert(1_000.0));
    assert_eq!(fitted.upper_threshold(), None);

    let value = fitted
        .calculate(&Column::from_strings("c", &repeat_labels(&[("A", 5), ("B", 95)])))
        .unwrap();
    assert!(fitted.last_p_value().unwrap() < 0.05);
    assert!(fitted.alert(value));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Non-finite input
// ═══════════════════════════════════════════════════════════════════════════════

fn estimated(kind: MethodKind) -> Method {
    Method::new(kind)
        .with_chunker(SizeBasedChunker::new(100))
        .with_computation_params(ComputationParams {
            calculation_method: CalculationMethod::Estimated,
            n_bins: 100,
        })
}

#[test]
fn test_wasserstein_estimated_rejects_infinite_analysis_value() {
    let reference = Column::from_f64("x", (0..2_000).map(|i| f64::from(i) / 2_000.0).collect());
    let fitted = estimated(MethodKind::Wasserstein).fit(&reference, None).unwrap();

    let result = fitted.measure(&Column::from_f64("x", vec![0.5, f64::INFINITY]));
    assert!(matches!(result, Err(Error::InvalidArguments { .. })));

    // finite but absurdly far outliers cannot grow the grid without bound
    let result = fitted.measure(&Column::from_f64("x", vec![0.5, 1e300]));
    assert!(matches!(result, Err(Error::Statistics { .. })));

    let value = fitted
        .measure(&Column::from_f64("x", vec![0.5, 10.0]))
        .unwrap()
        .value;
    assert!(value.is_finite());
}

#[test]
fn test_binned_methods_reject_infinite_reference_value() {
    let mut values: Vec<f64> = (0..500).map(f64::from).collect();
    values.push(f64::INFINITY);
    let reference = Column::from_f64("x", values);

    for kind in [
        MethodKind::JensenShannon,
        MethodKind::Hellinger,
        MethodKind::KolmogorovSmirnov,
        MethodKind::Wasserstein,
    ] {
        let result = estimated(kind).fit(&reference, None);
        assert!(
            matches!(result, Err(Error::InvalidArguments { .. })),
            "{kind} accepted an infinite reference value"
        );
    }
}

#[test]
fn test_calculator_reports_infinite_analysis_value() {
    let reference = ArrowDataset::from_columns(vec![Column::from_f64(
        "x",
        normal_sample(1_000, 0.0, 71),
    )])
    .unwrap();
    let mut analysis_values = normal_sample(200, 0.0, 72);
    analysis_values[150] = f64::NEG_INFINITY;
    let analysis =
        ArrowDataset::from_columns(vec![Column::from_f64("x", analysis_values)]).unwrap();

    let mut fitted = UnivariateDriftCalculator::new(["x"])
        .with_continuous_methods(["jensen_shannon"])
        .with_chunker(SizeBasedChunker::new(100))
        .fit(&reference)
        .unwrap();
    assert!(matches!(
        fitted.calculate(&analysis),
        Err(Error::InvalidArguments { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_registry_custom_round_trip() {
    let registry = MethodRegistry::builder()
        .with_builtins()
        .register("custom", FeatureType::Continuous, |params: MethodParams| {
            Method::from_params(MethodKind::Wasserstein, params)
                .with_names("Custom distance", "custom")
        })
        .build();

    let method = registry
        .create("custom", FeatureType::Continuous, MethodParams::default())
        .unwrap();
    assert_eq!(method.kind(), MethodKind::Wasserstein);
    assert_eq!(method.display_name(), "Custom distance");
    assert_eq!(method.column_name(), "custom");

    let err = registry
        .create("custom", FeatureType::Categorical, MethodParams::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArguments { .. }));

    let mut fitted = UnivariateDriftCalculator::new(["x"])
        .with_continuous_methods(["custom"])
        .with_registry(Arc::new(registry))
        .with_chunker(SizeBasedChunker::new(100))
        .fit(
            &ArrowDataset::from_columns(vec![Column::from_f64("x", normal_sample(600, 0.0, 51))])
                .unwrap(),
        )
        .unwrap();
    let result = fitted
        .calculate(
            &ArrowDataset::from_columns(vec![Column::from_f64("x", normal_sample(200, 0.0, 52))])
                .unwrap(),
        )
        .unwrap();
    assert_eq!(result.filter("x", "custom").len(), 8);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Config driven pipeline with data quality
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_config_and_quality_pipeline() {
    let config = DriftCalculatorConfig::from_yaml_str(
        r"
column_names: [income, city]
continuous_methods: [kolmogorov_smirnov]
categorical_methods: [l_infinity, chi2]
chunker:
  type: size
  chunk_size: 200
",
    )
    .unwrap();

    let cities = |n: usize, extra: Option<&str>| -> Vec<String> {
        (0..n)
            .map(|i| match (i % 4, extra) {
                (3, Some(city)) => city.to_string(),
                (0 | 1, _) => "Lisbon".to_string(),
                _ => "Porto".to_string(),
            })
            .collect()
    };

    let reference = ArrowDataset::from_columns(vec![
        Column::from_f64("income", normal_sample(1_600, 10.0, 61)),
        Column::from_strings("city", &cities(1_600, None)),
    ])
    .unwrap();
    let analysis = ArrowDataset::from_columns(vec![
        Column::from_f64("income", normal_sample(400, 10.0, 62)),
        Column::from_strings("city", &cities(400, Some("Faro"))),
    ])
    .unwrap();

    let mut drift = config
        .into_calculator(Arc::new(MethodRegistry::default()))
        .unwrap()
        .fit(&reference)
        .unwrap();
    let result = drift.calculate(&analysis).unwrap();
    let l_inf = result
        .filter_period(DataPeriod::Analysis)
        .filter("city", "l_infinity");
    // Porto drops from 0.5 to 0.25
    assert!(l_inf
        .records()
        .iter()
        .all(|r| (r.value - 0.25).abs() < 1e-12 && r.alert));

    let unseen = UnseenValuesCalculator::new(["city"])
        .with_chunker(SizeBasedChunker::new(200))
        .fit(&reference)
        .unwrap()
        .calculate(&analysis)
        .unwrap();
    let rows = unseen.filter_period(DataPeriod::Analysis);
    assert!(rows
        .records()
        .iter()
        .all(|r| (r.value - 0.25).abs() < 1e-12 && r.alert));

    let missing = MissingValuesCalculator::new(["income", "city"])
        .with_chunker(SizeBasedChunker::new(200))
        .fit(&reference)
        .unwrap()
        .calculate(&analysis)
        .unwrap();
    assert_eq!(missing.len(), (8 + 2) * 2);
    assert!(missing.records().iter().all(|r| r.value == 0.0));
}
