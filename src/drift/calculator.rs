//! Univariate drift calculator
//!
//! Fits one drift method per (column, method key) pair on reference data and
//! evaluates them chunk by chunk on analysis data.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, warn};

use crate::{
    chunk::{Chunker, DefaultChunker},
    column::{Column, FeatureType},
    dataset::{ArrowDataset, Dataset},
    drift::{
        method::{FittedMethod, MethodKind, MethodParams},
        registry::MethodRegistry,
        CardinalityRule, ComputationParams,
    },
    error::{Error, Result},
    result::{ChunkInfo, DataPeriod, DriftRecord, DriftResult},
    threshold::Threshold,
};

/// Configuration of a univariate drift calculation.
///
/// # Example
///
/// ```
/// use vigilar::drift::UnivariateDriftCalculator;
/// use vigilar::{ArrowDataset, Column, SizeBasedChunker};
///
/// let reference = ArrowDataset::from_columns(vec![
///     Column::from_f64("x", (0..600).map(|i| f64::from(i % 100)).collect()),
///     Column::from_strings(
///         "c",
///         &(0..600)
///             .map(|i| if i % 2 == 0 { "a" } else { "b" })
///             .collect::<Vec<_>>(),
///     ),
/// ])
/// .unwrap();
///
/// let mut calculator = UnivariateDriftCalculator::new(["x", "c"])
///     .with_continuous_methods(["kolmogorov_smirnov", "jensen_shannon"])
///     .with_categorical_methods(["chi2"])
///     .with_chunker(SizeBasedChunker::new(100))
///     .fit(&reference)
///     .unwrap();
///
/// let result = calculator.calculate(&reference).unwrap();
/// // 6 reference chunks and 6 analysis chunks, 3 methods each
/// assert_eq!(result.len(), 36);
/// ```
#[derive(Debug, Clone)]
pub struct UnivariateDriftCalculator {
    column_names: Vec<String>,
    timestamp_column_name: Option<String>,
    continuous_methods: Vec<String>,
    categorical_methods: Vec<String>,
    chunker: Arc<dyn Chunker>,
    thresholds: BTreeMap<String, Threshold>,
    computation_params: BTreeMap<String, ComputationParams>,
    cardinality: CardinalityRule,
    registry: Arc<MethodRegistry>,
}

fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

impl UnivariateDriftCalculator {
    /// Creates a calculator monitoring the given columns.
    ///
    /// Both feature types default to the Jensen-Shannon distance and the
    /// data is split by the [`DefaultChunker`].
    pub fn new<S: Into<String>>(column_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            column_names: strings(column_names),
            timestamp_column_name: None,
            continuous_methods: vec![MethodKind::JensenShannon.key().to_string()],
            categorical_methods: vec![MethodKind::JensenShannon.key().to_string()],
            chunker: Arc::new(DefaultChunker::new()),
            thresholds: BTreeMap::new(),
            computation_params: BTreeMap::new(),
            cardinality: CardinalityRule::default(),
            registry: Arc::new(MethodRegistry::default()),
        }
    }

    /// Sets the timestamp column passed to the methods and chunker.
    #[must_use]
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column_name = Some(name.into());
        self
    }

    /// Sets the method keys used for continuous columns.
    #[must_use]
    pub fn with_continuous_methods<S: Into<String>>(
        mut self,
        keys: impl IntoIterator<Item = S>,
    ) -> Self {
        self.continuous_methods = strings(keys);
        self
    }

    /// Sets the method keys used for categorical columns.
    #[must_use]
    pub fn with_categorical_methods<S: Into<String>>(
        mut self,
        keys: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categorical_methods = strings(keys);
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

    /// Overrides the threshold of one method key.
    #[must_use]
    pub fn with_threshold(mut self, method_key: impl Into<String>, threshold: Threshold) -> Self {
        self.thresholds.insert(method_key.into(), threshold);
        self
    }

    /// Overrides the computation settings of one method key.
    #[must_use]
    pub fn with_computation_params(
        mut self,
        method_key: impl Into<String>,
        params: ComputationParams,
    ) -> Self {
        self.computation_params.insert(method_key.into(), params);
        self
    }

    /// Sets the cardinality rule of the binned methods.
    #[must_use]
    pub fn with_cardinality_rule(mut self, rule: CardinalityRule) -> Self {
        self.cardinality = rule;
        self
    }

    /// Uses a custom method registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Monitored columns.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Method keys for a feature type.
    pub fn method_keys(&self, feature_type: FeatureType) -> &[String] {
        match feature_type {
            FeatureType::Continuous => &self.continuous_methods,
            FeatureType::Categorical => &self.categorical_methods,
        }
    }

    fn params_for(&self, key: &str) -> MethodParams {
        MethodParams {
            chunker: Arc::clone(&self.chunker),
            threshold: self.thresholds.get(key).cloned(),
            computation: self.computation_params.get(key).copied().unwrap_or_default(),
            cardinality: self.cardinality,
        }
    }

    fn check_columns(&self, data: &ArrowDataset, what: &str) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut required = self.column_names.clone();
        required.extend(self.timestamp_column_name.iter().cloned());
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

    /// Fits every configured method on the reference data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for empty reference data, an invalid
    /// arguments error listing missing columns or naming an unknown method
    /// key, and any error raised while fitting a method.
    pub fn fit(&self, reference: &ArrowDataset) -> Result<FittedUnivariateDriftCalculator> {
        if self.column_names.is_empty() {
            return Err(Error::invalid_arguments("no column names to monitor"));
        }
        self.check_columns(reference, "reference")?;

        let timestamps = self
            .timestamp_column_name
            .as_deref()
            .map(|name| reference.column(name))
            .transpose()?;

        let mut methods = Vec::new();
        for name in &self.column_names {
            let column = reference.column(name)?;
            let feature_type = column.feature_type()?;

            for key in self.method_keys(feature_type) {
                debug!(column = %name, method = %key, %feature_type, "creating drift method");
                let method = self
                    .registry
                    .create(key, feature_type, self.params_for(key))?;
                let fitted = method.fit(&column, timestamps.as_ref())?;
                methods.push(ColumnMethod {
                    column_name: name.clone(),
                    fitted,
                });
            }
        }

        let mut calculator = FittedUnivariateDriftCalculator {
            config: self.clone(),
            methods,
            reference_result: DriftResult::default(),
        };
        calculator.reference_result = calculator.run(reference, DataPeriod::Reference)?;

        Ok(calculator)
    }
}

#[derive(Debug, Clone)]
struct ColumnMethod {
    column_name: String,
    fitted: FittedMethod,
}

/// A drift calculator fitted on reference data.
#[derive(Debug, Clone)]
pub struct FittedUnivariateDriftCalculator {
    config: UnivariateDriftCalculator,
    methods: Vec<ColumnMethod>,
    reference_result: DriftResult,
}

impl FittedUnivariateDriftCalculator {
    /// The configuration this calculator was fitted from.
    pub fn config(&self) -> &UnivariateDriftCalculator {
        &self.config
    }

    /// Results on the reference chunks.
    pub fn reference_result(&self) -> &DriftResult {
        &self.reference_result
    }

    /// Fitted methods as `(column name, method)` pairs, in configuration
    /// order.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &FittedMethod)> {
        self.methods
            .iter()
            .map(|m| (m.column_name.as_str(), &m.fitted))
    }

    /// The fitted method for a column and result column name.
    pub fn method(&self, column_name: &str, method: &str) -> Option<&FittedMethod> {
        self.methods
            .iter()
            .find(|m| m.column_name == column_name && m.fitted.column_name() == method)
            .map(|m| &m.fitted)
    }

    /// Computes drift on analysis data.
    ///
    /// The result holds the reference rows followed by one row per
    /// analysis chunk and fitted method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] for empty data, an invalid arguments
    /// error listing missing columns, and any chunker or method error.
    pub fn calculate(&mut self, data: &ArrowDataset) -> Result<DriftResult> {
        self.config.check_columns(data, "analysis")?;
        let analysis = self.run(data, DataPeriod::Analysis)?;

        let mut result = self.reference_result.clone();
        result.extend(analysis);
        Ok(result)
    }

    fn run(&mut self, data: &ArrowDataset, period: DataPeriod) -> Result<DriftResult> {
        let chunks = self.config.chunker.split(data)?;
        debug!(
            period = period.as_str(),
            chunks = chunks.len(),
            methods = self.methods.len(),
            "calculating univariate drift"
        );

        let mut records = Vec::with_capacity(chunks.len() * self.methods.len());
        for chunk in &chunks {
            let info = ChunkInfo::from_chunk(chunk, period);
            for ColumnMethod {
                column_name,
                fitted,
            } in &mut self.methods
            {
                let column: Column = chunk.column(column_name)?;
                let (value, p_value, alert) = match fitted.calculate(&column) {
                    Ok(value) => (value, fitted.last_p_value(), fitted.alert(value)),
                    Err(Error::EmptyColumn { .. }) => {
                        warn!(
                            column = %column_name,
                            method = fitted.column_name(),
                            chunk = %chunk.key,
                            "chunk has no non-missing values"
                        );
                        (f64::NAN, None, false)
                    }
                    Err(e) => return Err(e),
                };

                records.push(DriftRecord {
                    chunk: info.clone(),
                    column_name: column_name.clone(),
                    method: fitted.column_name().to_string(),
                    value,
                    p_value,
                    lower_threshold: fitted.lower_threshold(),
                    upper_threshold: fitted.upper_threshold(),
                    alert,
                });
            }
        }

        Ok(DriftResult::new(records))
    }
}
