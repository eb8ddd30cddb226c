//! Unseen categorical values per chunk

use std::{collections::BTreeSet, sync::Arc};

use tracing::debug;

use super::{chunk_values, evaluate, metric_limits, require_columns, scale, ColumnBaseline};
use crate::{
    chunk::{Chunk, Chunker, DefaultChunker},
    column::{Column, FeatureType, Values},
    dataset::ArrowDataset,
    error::{Error, Result},
    result::{DataPeriod, QualityResult},
    threshold::{calculate_threshold_values, Threshold, ThresholdLimits},
};

/// Monitors categorical values that never occurred in the reference data.
///
/// Missing values are not counted as unseen.
#[derive(Debug, Clone)]
pub struct UnseenValuesCalculator {
    column_names: Vec<String>,
    timestamp_column_name: Option<String>,
    normalize: bool,
    chunker: Arc<dyn Chunker>,
    threshold: Threshold,
}

impl UnseenValuesCalculator {
    /// Creates a calculator for the given categorical columns.
    ///
    /// Values are normalized to rates and any unseen value raises an alert.
    pub fn new<S: Into<String>>(column_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            column_names: column_names.into_iter().map(Into::into).collect(),
            timestamp_column_name: None,
            normalize: true,
            chunker: Arc::new(DefaultChunker::new()),
            threshold: Threshold::constant(None, Some(0.0)),
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
            "unseen_values_rate"
        } else {
            "unseen_values_count"
        }
    }

    /// Bounds the thresholds may not cross.
    pub fn threshold_limits(&self) -> ThresholdLimits {
        metric_limits(self.normalize)
    }

    fn measure(&self, seen: &BTreeSet<String>, column: &Column) -> Result<f64> {
        let unseen = match column.values()? {
            Values::Categorical(labels) => labels.iter().filter(|l| !seen.contains(*l)).count(),
            Values::Numeric(_) => {
                return Err(Error::schema_mismatch(format!(
                    "column '{}' is no longer categorical",
                    column.name()
                )))
            }
        };
        Ok(scale(unseen, column.len(), self.normalize))
    }

    /// Learns the reference label sets and thresholds.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error when no columns are configured,
    /// some are absent or a column is not categorical,
    /// [`crate::Error::EmptyDataset`] for empty data, and any chunker error.
    pub fn fit(&self, reference: &ArrowDataset) -> Result<FittedUnseenValuesCalculator> {
        require_columns(
            reference,
            &self.column_names,
            self.timestamp_column_name.as_deref(),
            "reference",
        )?;

        let continuous: Vec<&str> = self
            .column_names
            .iter()
            .map(|name| Ok((name, reference.column(name)?.feature_type()?)))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|(_, feature_type)| *feature_type == FeatureType::Continuous)
            .map(|(name, _)| name.as_str())
            .collect();
        if !continuous.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "unseen values require categorical columns, got continuous: {}",
                continuous.join(", ")
            )));
        }

        let chunks = self.chunker.split(reference)?;
        let metric = self.metric_name();

        let mut baselines = Vec::with_capacity(self.column_names.len());
        for name in &self.column_names {
            let seen: BTreeSet<String> = match reference.column(name)?.values()? {
                Values::Categorical(labels) => labels.into_iter().collect(),
                Values::Numeric(_) => BTreeSet::new(),
            };
            debug!(column = %name, metric, seen = seen.len(), "fitting unseen values");

            let values = chunk_values(&chunks, name, |c| self.measure(&seen, c))?;
            let (lower_threshold, upper_threshold) = calculate_threshold_values(
                &self.threshold,
                &values,
                self.threshold_limits(),
                true,
                metric,
            );

            baselines.push(ColumnBaseline {
                column_name: name.clone(),
                state: seen,
                lower_threshold,
                upper_threshold,
            });
        }

        let mut fitted = FittedUnseenValuesCalculator {
            config: self.clone(),
            baselines,
            reference_result: QualityResult::default(),
        };
        fitted.reference_result = fitted.run(&chunks, DataPeriod::Reference)?;
        Ok(fitted)
    }
}

/// An unseen values calculator fitted on reference data.
#[derive(Debug, Clone)]
pub struct FittedUnseenValuesCalculator {
    config: UnseenValuesCalculator,
    baselines: Vec<ColumnBaseline<BTreeSet<String>>>,
    reference_result: QualityResult,
}

impl FittedUnseenValuesCalculator {
    /// The configuration this calculator was fitted from.
    pub fn config(&self) -> &UnseenValuesCalculator {
        &self.config
    }

    /// Results on the reference chunks.
    pub fn reference_result(&self) -> &QualityResult {
        &self.reference_result
    }

    /// Labels of a column seen in the reference data.
    pub fn seen_values(&self, column_name: &str) -> Option<&BTreeSet<String>> {
        self.baselines
            .iter()
            .find(|b| b.column_name == column_name)
            .map(|b| &b.state)
    }

    /// Computes unseen value metrics on analysis data.
    ///
    /// The result holds the reference rows followed by the analysis rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmptyDataset`] for empty data, an invalid
    /// arguments error listing missing columns, a schema mismatch when a
    /// column is no longer categorical, and any chunker error.
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
            "calculating unseen values"
        );
        evaluate(
            chunks,
            period,
            &self.baselines,
            self.config.metric_name(),
            self.config.threshold_limits(),
            |baseline, column| Ok((self.config.measure(&baseline.state, column)?, 0.0)),
        )
    }
}
