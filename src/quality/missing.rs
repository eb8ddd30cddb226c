//! Missing value rate per chunk

use std::sync::Arc;

use tracing::debug;

use super::{chunk_values, evaluate, metric_limits, require_columns, scale, ColumnBaseline};
use crate::{
    chunk::{Chunk, Chunker, DefaultChunker},
    column::Column,
    dataset::ArrowDataset,
    error::Result,
    result::{DataPeriod, QualityResult},
    threshold::{calculate_threshold_values, Threshold, ThresholdLimits},
};

/// Monitors the share of missing values (nulls and NaN) per column.
#[derive(Debug, Clone)]
pub struct MissingValuesCalculator {
    column_names: Vec<String>,
    timestamp_column_name: Option<String>,
    normalize: bool,
    chunker: Arc<dyn Chunker>,
    threshold: Threshold,
}

impl MissingValuesCalculator {
    /// Creates a calculator for the given columns.
    ///
    /// Values are normalized to rates, data is split by the
    /// [`DefaultChunker`] and thresholds use three standard deviations.
    pub fn new<S: Into<String>>(column_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            column_names: column_names.into_iter().map(Into::into).collect(),
            timestamp_column_name: None,
            normalize: true,
            chunker: Arc::new(DefaultChunker::new()),
            threshold: Threshold::standard_deviation(),
        }
    }

    /// Requires a timestamp column in the data.
    #[must_use]
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column_name = Some(name.into());
        self
    }

    /// Reports rates when true, raw counts when false.
    #[must_use]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Sets the chunker.
    #[must_use]
    pub fn with_chunker<C: Chunker + 'static>(self, chunker: C) -> Self {
        self.with_shared_chunker(Arc::new(chunker))
    }

    /// Sets a shared chunker.
    #[must_use]
    pub fn with_shared_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Sets the threshold strategy.
    #[must_use]
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    /// Monitored columns.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Metric name written to result rows.
    pub fn metric_name(&self) -> &'static str {
        if self.normalize {
            "missing_values_rate"
        } else {
            "missing_values_count"
        }
    }

    /// Bounds the thresholds may not cross.
    pub fn threshold_limits(&self) -> ThresholdLimits {
        metric_limits(self.normalize)
    }

    fn measure(&self, column: &Column) -> f64 {
        scale(column.missing_count(), column.len(), self.normalize)
    }

    /// Learns the reference missing rates and thresholds.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error when no columns are configured or
    /// some are absent, [`crate::Error::EmptyDataset`] for empty data, and
    /// any chunker error.
    pub fn fit(&self, reference: &ArrowDataset) -> Result<FittedMissingValuesCalculator> {
        require_columns(
            reference,
            &self.column_names,
            self.timestamp_column_name.as_deref(),
            "reference",
        )?;

        let chunks = self.chunker.split(reference)?;
        let metric = self.metric_name();

        let mut baselines = Vec::with_capacity(self.column_names.len());
        for name in &self.column_names {
            let column = reference.column(name)?;
            let missing_rate = scale(column.missing_count(), column.len(), true);
            debug!(column = %name, metric, missing_rate, "fitting missing values");

            let values = chunk_values(&chunks, name, |c| Ok(self.measure(c)))?;
            let (lower_threshold, upper_threshold) = calculate_threshold_values(
                &self.threshold,
                &values,
                self.threshold_limits(),
                true,
                metric,
            );

            baselines.push(ColumnBaseline {
                column_name: name.clone(),
                state: missing_rate,
                lower_threshold,
                upper_threshold,
            });
        }

        let mut fitted = FittedMissingValuesCalculator {
            config: self.clone(),
            baselines,
            reference_result: QualityResult::default(),
        };
        fitted.reference_result = fitted.run(&chunks, DataPeriod::Reference)?;
        Ok(fitted)
    }
}

/// A missing values calculator fitted on reference data.
#[derive(Debug, Clone)]
pub struct FittedMissingValuesCalculator {
    config: MissingValuesCalculator,
    baselines: Vec<ColumnBaseline<f64>>,
    reference_result: QualityResult,
}

impl FittedMissingValuesCalculator {
    /// The configuration this calculator was fitted from.
    pub fn config(&self) -> &MissingValuesCalculator {
        &self.config
    }

    /// Results on the reference chunks.
    pub fn reference_result(&self) -> &QualityResult {
        &self.reference_result
    }

    /// Missing rate of a column in the reference data.
    pub fn reference_rate(&self, column_name: &str) -> Option<f64> {
        self.baseline(column_name).map(|b| b.state)
    }

    /// Lower and upper threshold of a column.
    pub fn thresholds(&self, column_name: &str) -> Option<(Option<f64>, Option<f64>)> {
        self.baseline(column_name)
            .map(|b| (b.lower_threshold, b.upper_threshold))
    }

    fn baseline(&self, column_name: &str) -> Option<&ColumnBaseline<f64>> {
        self.baselines.iter().find(|b| b.column_name == column_name)
    }

    /// Computes missing value metrics on analysis data.
    ///
    /// The result holds the reference rows followed by the analysis rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyDataset`] for empty data, an invalid
    /// arguments error listing missing columns, and any chunker error.
    pub fn calculate(&self, data: &ArrowDataset) -> Result<QualityResult> {
        require_columns(
            data,
            &self.config.column_names,
            self.config.timestamp_column_name.as_deref(),
            "analysis",
        )?;

        let chunks = self.config.chunker.split(data)?;
        let mut result = self.reference_result.clone();
        result.extend(self.run(&chunks, DataPeriod::Analysis)?);
        Ok(result)
    }

    fn run(&self, chunks: &[Chunk], period: DataPeriod) -> Result<QualityResult> {
        debug!(
            period = period.as_str(),
            chunks = chunks.len(),
            columns = self.baselines.len(),
            "calculating missing values"
        );
        let normalize = self.config.normalize;
        evaluate(
            chunks,
            period,
            &self.baselines,
            self.config.metric_name(),
            self.config.threshold_limits(),
            |baseline, column| {
                Ok((
                    self.config.measure(column),
                    sampling_error(baseline.state, column.len(), normalize),
                ))
            },
        )
    }
}

/// Binomial standard error of a rate `p` over `n` rows, or of the matching
/// count when not normalized.
pub(crate) fn sampling_error(p: f64, n: usize, normalize: bool) -> f64 {
    let n = n as f64;
    let std = (p * (1.0 - p)).sqrt();
    if normalize {
        std / n.sqrt()
    } else {
        std * n.sqrt()
    }
}
