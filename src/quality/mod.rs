//! Data quality monitoring
//!
//! Two calculators follow the same fit, threshold and calculate cycle as the
//! drift calculator, but measure simple per-chunk aggregates:
//!
//! - [`MissingValuesCalculator`]: rate (or count) of nulls and NaN values
//! - [`UnseenValuesCalculator`]: rate (or count) of categorical values that
//!   never occurred in the reference data
//!
//! Thresholds come from the metric values on the reference chunks and are
//! dropped when they cross the metric limits. Every row carries a sampling
//! error and a confidence band of [`SAMPLING_ERROR_RANGE`] sampling errors
//! around the value.
//!
//! # Example
//!
//! ```
//! use vigilar::quality::MissingValuesCalculator;
//! use vigilar::{ArrowDataset, Column, SizeBasedChunker};
//!
//! let values: Vec<Option<f64>> = (0..400)
//!     .map(|i| if i % 10 == 0 { None } else { Some(f64::from(i)) })
//!     .collect();
//! let reference =
//!     ArrowDataset::from_columns(vec![Column::from_optional_f64("x", values)]).unwrap();
//!
//! let calculator = MissingValuesCalculator::new(["x"])
//!     .with_chunker(SizeBasedChunker::new(100))
//!     .fit(&reference)
//!     .unwrap();
//!
//! let result = calculator.calculate(&reference).unwrap();
//! assert_eq!(result.len(), 8);
//! assert!((result.records()[0].value - 0.1).abs() < 1e-12);
//! ```

// Allow casts for row counts
#![allow(clippy::cast_precision_loss)]

mod missing;
mod unseen;

#[cfg(test)]
mod tests;

pub use missing::{FittedMissingValuesCalculator, MissingValuesCalculator};
pub use unseen::{FittedUnseenValuesCalculator, UnseenValuesCalculator};

use crate::{
    chunk::Chunk,
    column::Column,
    dataset::{ArrowDataset, Dataset},
    error::{Error, Result},
    result::{ChunkInfo, DataPeriod, QualityRecord, QualityResult},
    threshold::ThresholdLimits,
};

/// Width of the confidence band, in sampling errors.
pub const SAMPLING_ERROR_RANGE: f64 = 3.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Shared building blocks
// ═══════════════════════════════════════════════════════════════════════════════

/// Fitted per-column state: reference statistics plus alert thresholds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnBaseline<S> {
    pub(crate) column_name: String,
    pub(crate) state: S,
    pub(crate) lower_threshold: Option<f64>,
    pub(crate) upper_threshold: Option<f64>,
}

/// Checks that data is non-empty and holds every required column.
pub(crate) fn require_columns(
    data: &ArrowDataset,
    column_names: &[String],
    timestamp_column_name: Option<&str>,
    what: &str,
) -> Result<()> {
    if column_names.is_empty() {
        return Err(Error::invalid_arguments("no column names to monitor"));
    }
    if data.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut required = column_names.to_vec();
    required.extend(timestamp_column_name.map(str::to_string));
    let missing = data.missing_columns(&required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_arguments(format!(
            "{what} data is missing required columns: {}",
            missing.join(", ")
        )))
    }
}

/// Limits of a rate, or of a count when not normalized.
pub(crate) fn metric_limits(normalize: bool) -> ThresholdLimits {
    if normalize {
        ThresholdLimits::unit_interval()
    } else {
        ThresholdLimits::non_negative()
    }
}

/// Divides by the row count when normalizing.
pub(crate) fn scale(count: usize, total: usize, normalize: bool) -> f64 {
    if normalize {
        count as f64 / total as f64
    } else {
        count as f64
    }
}

/// True when the value lies outside the thresholds. NaN never alerts.
pub(crate) fn is_alert(value: f64, lower: Option<f64>, upper: Option<f64>) -> bool {
    upper.is_some_and(|u| value > u) || lower.is_some_and(|l| value < l)
}

/// Metric value of one column on every chunk.
pub(crate) fn chunk_values<F>(
    chunks: &[Chunk],
    column_name: &str,
    mut measure: F,
) -> Result<Vec<f64>>
where
    F: FnMut(&Column) -> Result<f64>,
{
    chunks
        .iter()
        .map(|chunk| measure(&chunk.column(column_name)?))
        .collect()
}

/// Builds result rows for every chunk and column, chunks outermost.
///
/// `measure` yields the value and sampling error of a column on a chunk.
pub(crate) fn evaluate<S, F>(
    chunks: &[Chunk],
    period: DataPeriod,
    baselines: &[ColumnBaseline<S>],
    metric: &str,
    limits: ThresholdLimits,
    mut measure: F,
) -> Result<QualityResult>
where
    F: FnMut(&ColumnBaseline<S>, &Column) -> Result<(f64, f64)>,
{
    let mut records = Vec::with_capacity(chunks.len() * baselines.len());
    for chunk in chunks {
        let info = ChunkInfo::from_chunk(chunk, period);
        for baseline in baselines {
            let column = chunk.column(&baseline.column_name)?;
            let (value, sampling_error) = measure(baseline, &column)?;
            records.push(QualityRecord {
                chunk: info.clone(),
                column_name: baseline.column_name.clone(),
                metric: metric.to_string(),
                value,
                sampling_error,
                upper_confidence_boundary: Some(clip_upper(
                    value + SAMPLING_ERROR_RANGE * sampling_error,
                    limits,
                )),
                lower_confidence_boundary: Some(clip_lower(
                    value - SAMPLING_ERROR_RANGE * sampling_error,
                    limits,
                )),
                lower_threshold: baseline.lower_threshold,
                upper_threshold: baseline.upper_threshold,
                alert: is_alert(value, baseline.lower_threshold, baseline.upper_threshold),
            });
        }
    }
    Ok(QualityResult::new(records))
}

fn clip_upper(value: f64, limits: ThresholdLimits) -> f64 {
    limits.upper.map_or(value, |limit| value.min(limit))
}

fn clip_lower(value: f64, limits: ThresholdLimits) -> f64 {
    limits.lower.map_or(value, |limit| value.max(limit))
}
