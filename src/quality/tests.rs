//! Tests for the quality module.

use super::*;
use crate::{
    chunk::SizeBasedChunker,
    column::Column,
    dataset::ArrowDataset,
    error::Error,
    result::DataPeriod,
    threshold::Threshold,
};

/// Chunks of `size` rows where chunk `k` starts with `counts[k]` nulls.
fn with_missing(counts: &[usize], size: usize) -> Vec<Option<f64>> {
    counts
        .iter()
        .flat_map(|&m| (0..size).map(move |i| (i >= m).then_some(i as f64)))
        .collect()
}

fn numeric(counts: &[usize]) -> ArrowDataset {
    ArrowDataset::from_columns(vec![Column::from_optional_f64("x", with_missing(counts, 50))])
        .unwrap()
}

fn labels(values: &[&str]) -> ArrowDataset {
    ArrowDataset::from_columns(vec![Column::from_strings("c", values)]).unwrap()
}

fn cycle(n: usize, cycle: &[&'static str]) -> Vec<&'static str> {
    (0..n).map(|i| cycle[i % cycle.len()]).collect()
}

// ========== shared helpers ==========

#[test]
fn test_is_alert() {
    assert!(is_alert(0.5, None, Some(0.4)));
    assert!(is_alert(0.1, Some(0.2), None));
    assert!(!is_alert(0.3, Some(0.2), Some(0.4)));
    assert!(!is_alert(0.3, None, None));
    assert!(!is_alert(f64::NAN, Some(0.2), Some(0.4)));
}

#[test]
fn test_sampling_error_rate_and_count() {
    let rate = missing::sampling_error(0.1, 50, true);
    assert!((rate - 0.3 / 50.0_f64.sqrt()).abs() < 1e-12);

    let count = missing::sampling_error(0.1, 50, false);
    assert!((count - 0.3 * 50.0_f64.sqrt()).abs() < 1e-12);

    assert_eq!(missing::sampling_error(0.0, 50, true), 0.0);
}

#[test]
fn test_require_columns() {
    let data = numeric(&[1]);
    assert!(require_columns(&data, &["x".to_string()], None, "reference").is_ok());

    let err = require_columns(
        &data,
        &["x".to_string(), "y".to_string()],
        Some("ts"),
        "reference",
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidArguments { .. }));
    let msg = err.to_string();
    assert!(msg.contains('y'));
    assert!(msg.contains("ts"));

    assert!(matches!(
        require_columns(&data, &[], None, "reference"),
        Err(Error::InvalidArguments { .. })
    ));
}

// ========== MissingValuesCalculator ==========

#[test]
fn test_missing_values_thresholds_from_reference_chunks() {
    // chunk rates 0.08, 0.10, 0.12, 0.10
    let fitted = MissingValuesCalculator::new(["x"])
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[4, 5, 6, 5]))
        .unwrap();

    assert!((fitted.reference_rate("x").unwrap() - 0.1).abs() < 1e-12);

    let (lower, upper) = fitted.thresholds("x").unwrap();
    let std = 0.0002_f64.sqrt();
    assert!((lower.unwrap() - (0.1 - 3.0 * std)).abs() < 1e-9);
    assert!((upper.unwrap() - (0.1 + 3.0 * std)).abs() < 1e-9);

    let reference = fitted.reference_result();
    assert_eq!(reference.len(), 4);
    assert!(reference.alerts().is_empty());
    assert!(reference
        .records()
        .iter()
        .all(|r| r.metric == "missing_values_rate" && r.chunk.period == DataPeriod::Reference));
}

#[test]
fn test_missing_values_alerts_on_analysis() {
    let fitted = MissingValuesCalculator::new(["x"])
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[4, 5, 6, 5]))
        .unwrap();

    let result = fitted.calculate(&numeric(&[5, 20])).unwrap();
    assert_eq!(result.len(), 6);

    let analysis = result.filter_period(DataPeriod::Analysis);
    let rows = analysis.records();
    assert!((rows[0].value - 0.1).abs() < 1e-12);
    assert!(!rows[0].alert);
    assert!((rows[1].value - 0.4).abs() < 1e-12);
    assert!(rows[1].alert);

    // sampling error uses the reference rate and the chunk size
    let expected = 0.3 / 50.0_f64.sqrt();
    assert!((rows[0].sampling_error - expected).abs() < 1e-12);
    assert_eq!(rows[0].lower_confidence_boundary, Some(0.0));
    let upper = rows[0].upper_confidence_boundary.unwrap();
    assert!((upper - (0.1 + 3.0 * expected)).abs() < 1e-12);
}

#[test]
fn test_missing_values_counts() {
    let fitted = MissingValuesCalculator::new(["x"])
        .with_normalize(false)
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[4, 5, 6, 5]))
        .unwrap();
    assert_eq!(fitted.config().metric_name(), "missing_values_count");

    let result = fitted.calculate(&numeric(&[20])).unwrap();
    let analysis = result.filter_period(DataPeriod::Analysis);
    let row = &analysis.records()[0];
    assert!((row.value - 20.0).abs() < 1e-12);
    assert!(row.alert);
    assert!((row.sampling_error - 0.3 * 50.0_f64.sqrt()).abs() < 1e-9);

    // counts have no upper limit
    let upper = row.upper_confidence_boundary.unwrap();
    assert!((upper - (20.0 + 9.0 * 50.0_f64.sqrt() * 0.1)).abs() < 1e-9);
}

#[test]
fn test_missing_values_thresholds_outside_limits_are_dropped() {
    let fitted = MissingValuesCalculator::new(["x"])
        .with_threshold(Threshold::constant(Some(-0.5), Some(2.0)))
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[4, 5]))
        .unwrap();
    assert_eq!(fitted.thresholds("x"), Some((None, None)));

    let result = fitted.calculate(&numeric(&[50])).unwrap();
    assert!(result.alerts().is_empty());
}

#[test]
fn test_missing_values_counts_nan() {
    let values: Vec<f64> = (0..100)
        .map(|i| if i % 4 == 0 { f64::NAN } else { f64::from(i) })
        .collect();
    let data = ArrowDataset::from_columns(vec![Column::from_f64("x", values)]).unwrap();

    let fitted = MissingValuesCalculator::new(["x"])
        .with_chunker(SizeBasedChunker::new(100))
        .fit(&data)
        .unwrap();
    assert!((fitted.reference_rate("x").unwrap() - 0.25).abs() < 1e-12);
}

#[test]
fn test_missing_values_rejects_bad_input() {
    let calculator = MissingValuesCalculator::new(["x", "ghost"]);
    let err = calculator.fit(&numeric(&[1])).unwrap_err();
    assert!(err.to_string().contains("ghost"));

    let empty = ArrowDataset::from_columns(vec![Column::from_f64("x", vec![])]).unwrap();
    assert!(matches!(
        MissingValuesCalculator::new(["x"]).fit(&empty),
        Err(Error::EmptyDataset)
    ));

    let fitted = MissingValuesCalculator::new(["x"])
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[1]))
        .unwrap();
    assert!(matches!(
        fitted.calculate(&labels(&["a"])),
        Err(Error::InvalidArguments { .. })
    ));
}

#[test]
fn test_missing_values_to_record_batch() {
    let fitted = MissingValuesCalculator::new(["x"])
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&numeric(&[4, 5]))
        .unwrap();
    let batch = fitted
        .calculate(&numeric(&[5]))
        .unwrap()
        .to_record_batch()
        .unwrap();
    assert_eq!(batch.num_rows(), 3);
    assert!(batch.column_by_name("sampling_error").is_some());
}

// ========== UnseenValuesCalculator ==========

#[test]
fn test_unseen_values_detects_new_labels() {
    let fitted = UnseenValuesCalculator::new(["c"])
        .with_chunker(SizeBasedChunker::new(50))
        .fit(&labels(&cycle(200, &["a", "b"])))
        .unwrap();

    let seen: Vec<&str> = fitted
        .seen_values("c")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(seen, vec!["a", "b"]);

    let reference = fitted.reference_result();
    assert_eq!(reference.len(), 4);
    assert!(reference.records().iter().all(|r| r.value == 0.0 && !r.alert));
    assert!(reference
        .records()
        .iter()
        .all(|r| r.lower_threshold.is_none() && r.upper_threshold == Some(0.0)));

    let mut analysis = cycle(50, &["a", "b"]);
    analysis.extend(std::iter::repeat("c").take(10));
    analysis.extend(std::iter::repeat("a").take(40));

    let result = fitted.calculate(&labels(&analysis)).unwrap();
    let rows = result.filter_period(DataPeriod::Analysis);
    let rows = rows.records();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].value, 0.0);
    assert!(!rows[0].alert);
    assert!((rows[1].value - 0.2).abs() < 1e-12);
    assert!(rows[1].alert);
    assert_eq!(rows[1].sampling_error, 0.0);
    assert_eq!(rows[1].upper_confidence_boundary, Some(rows[1].value));
}

#[test]
fn test_unseen_values_ignores_missing() {
    let fitted = UnseenValuesCalculator::new(["c"])
        .with_chunker(SizeBasedChunker::new(10))
        .fit(&labels(&cycle(20, &["a", "b"])))
        .unwrap();

    let values: Vec<Option<&str>> = (0..10).map(|i| (i % 2 == 0).then_some("a")).collect();
    let data = ArrowDataset::from_columns(vec![Column::from_optional_strings("c", &values)])
        .unwrap();
    let result = fitted.calculate(&data).unwrap();
    assert!(result.alerts().is_empty());
}

#[test]
fn test_unseen_values_counts() {
    let fitted = UnseenValuesCalculator::new(["c"])
        .with_normalize(false)
        .with_chunker(SizeBasedChunker::new(10))
        .fit(&labels(&cycle(20, &["a", "b"])))
        .unwrap();
    assert_eq!(fitted.config().metric_name(), "unseen_values_count");

    let result = fitted
        .calculate(&labels(&cycle(10, &["a", "x", "y"])))
        .unwrap();
    let analysis = result.filter_period(DataPeriod::Analysis);
    let row = &analysis.records()[0];
    assert_eq!(row.value, 6.0);
    assert!(row.alert);
}

#[test]
fn test_unseen_values_rejects_continuous_columns() {
    let data = ArrowDataset::from_columns(vec![
        Column::from_strings("c", &cycle(20, &["a"])),
        Column::from_f64("x", (0..20).map(f64::from).collect()),
    ])
    .unwrap();

    let err = UnseenValuesCalculator::new(["c", "x"])
        .fit(&data)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArguments { .. }));
    assert!(err.to_string().contains('x'));
}
