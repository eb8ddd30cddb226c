//! Drift method configuration and fitted state

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    chunk::{Chunker, DefaultChunker},
    column::{Column, FeatureType, Values},
    dataset::ArrowDataset,
    drift::{
        binning::BinnedReference, chi2::Chi2Reference, hellinger, jensen_shannon,
        kolmogorov_smirnov::KsReference, l_infinity::LInfinityReference,
        wasserstein::WassersteinReference, CalculationMethod, CardinalityRule, ComputationParams,
    },
    error::{Error, Result},
    threshold::{calculate_threshold_values, Threshold, ThresholdLimits},
};

/// Significance level of the chi-squared alert.
pub const CHI2_SIGNIFICANCE: f64 = 0.05;

/// The built-in drift statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Jensen-Shannon distance
    JensenShannon,
    /// Two-sample Kolmogorov-Smirnov statistic
    KolmogorovSmirnov,
    /// Chi-squared contingency statistic
    Chi2,
    /// L-Infinity distance between label frequencies
    LInfinity,
    /// First Wasserstein distance
    Wasserstein,
    /// Hellinger distance
    Hellinger,
}

/// How a method decides to raise an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertRule {
    /// Alert when the value leaves the threshold band
    ThresholdBand,
    /// Alert when the p-value of the last calculation is below the level
    PValueBelow(f64),
}

impl MethodKind {
    /// All built-in kinds.
    pub const ALL: [Self; 6] = [
        Self::JensenShannon,
        Self::KolmogorovSmirnov,
        Self::Chi2,
        Self::LInfinity,
        Self::Wasserstein,
        Self::Hellinger,
    ];

    /// Registry key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::JensenShannon => "jensen_shannon",
            Self::KolmogorovSmirnov => "kolmogorov_smirnov",
            Self::Chi2 => "chi2",
            Self::LInfinity => "l_infinity",
            Self::Wasserstein => "wasserstein",
            Self::Hellinger => "hellinger",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JensenShannon => "Jensen-Shannon distance",
            Self::KolmogorovSmirnov => "Kolmogorov-Smirnov statistic",
            Self::Chi2 => "Chi2 statistic",
            Self::LInfinity => "L-Infinity distance",
            Self::Wasserstein => "Wasserstein distance",
            Self::Hellinger => "Hellinger distance",
        }
    }

    /// Default result column name.
    pub fn column_name(&self) -> &'static str {
        self.key()
    }

    /// Feature types the statistic is defined for.
    pub fn feature_types(&self) -> &'static [FeatureType] {
        match self {
            Self::JensenShannon | Self::Hellinger => {
                &[FeatureType::Continuous, FeatureType::Categorical]
            }
            Self::KolmogorovSmirnov | Self::Wasserstein => &[FeatureType::Continuous],
            Self::Chi2 | Self::LInfinity => &[FeatureType::Categorical],
        }
    }

    /// Returns true if the statistic is defined for the feature type.
    pub fn supports(&self, feature_type: FeatureType) -> bool {
        self.feature_types().contains(&feature_type)
    }

    /// Hard limits of the alert thresholds.
    pub fn threshold_limits(&self) -> ThresholdLimits {
        match self {
            Self::KolmogorovSmirnov | Self::Chi2 => ThresholdLimits::unit_interval(),
            Self::JensenShannon | Self::LInfinity | Self::Wasserstein | Self::Hellinger => {
                ThresholdLimits::non_negative()
            }
        }
    }

    /// Threshold used when none is configured.
    pub fn default_threshold(&self) -> Threshold {
        match self {
            Self::JensenShannon | Self::Hellinger | Self::LInfinity => {
                Threshold::constant(None, Some(0.1))
            }
            Self::KolmogorovSmirnov | Self::Wasserstein | Self::Chi2 => {
                Threshold::standard_deviation()
            }
        }
    }

    /// Alerting rule.
    pub fn alert_rule(&self) -> AlertRule {
        match self {
            Self::Chi2 => AlertRule::PValueBelow(CHI2_SIGNIFICANCE),
            _ => AlertRule::ThresholdBand,
        }
    }

    /// Looks up a kind by registry key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Construction arguments a registry forwards to a method constructor.
#[derive(Debug, Clone)]
pub struct MethodParams {
    /// Chunker used to derive thresholds from the reference data
    pub chunker: Arc<dyn Chunker>,
    /// Threshold override; `None` uses the method default
    pub threshold: Option<Threshold>,
    /// Computation settings for KS and Wasserstein
    pub computation: ComputationParams,
    /// Continuous versus categorical treatment of numeric data
    pub cardinality: CardinalityRule,
}

impl Default for MethodParams {
    fn default() -> Self {
        Self {
            chunker: Arc::new(DefaultChunker::new()),
            threshold: None,
            computation: ComputationParams::default(),
            cardinality: CardinalityRule::default(),
        }
    }
}

/// An unfit drift method: a statistic plus its configuration.
#[derive(Debug, Clone)]
pub struct Method {
    kind: MethodKind,
    display_name: String,
    column_name: String,
    chunker: Arc<dyn Chunker>,
    threshold: Threshold,
    computation: ComputationParams,
    cardinality: CardinalityRule,
}

impl Method {
    /// Creates a method with default configuration.
    pub fn new(kind: MethodKind) -> Self {
        Self::from_params(kind, MethodParams::default())
    }

    /// Creates a method from registry construction arguments.
    pub fn from_params(kind: MethodKind, params: MethodParams) -> Self {
        Self {
            kind,
            display_name: kind.display_name().to_string(),
            column_name: kind.column_name().to_string(),
            chunker: params.chunker,
            threshold: params.threshold.unwrap_or_else(|| kind.default_threshold()),
            computation: params.computation,
            cardinality: params.cardinality,
        }
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

    /// Sets the threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the computation settings.
    #[must_use]
    pub fn with_computation_params(mut self, computation: ComputationParams) -> Self {
        self.computation = computation;
        self
    }

    /// Sets the cardinality rule.
    #[must_use]
    pub fn with_cardinality_rule(mut self, cardinality: CardinalityRule) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Overrides the display and result column names.
    #[must_use]
    pub fn with_names(
        mut self,
        display_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        self.display_name = display_name.into();
        self.column_name = column_name.into();
        self
    }

    /// Statistic computed by the method.
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Human readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Result column name.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Configured threshold.
    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    /// Configured computation settings.
    pub fn computation_params(&self) -> ComputationParams {
        self.computation
    }

    /// Hard limits of the alert thresholds.
    pub fn threshold_limits(&self) -> ThresholdLimits {
        self.kind.threshold_limits()
    }

    /// Fits the method on a reference column.
    ///
    /// The reference distribution is learned first. The reference data
    /// (joined with `timestamps` when given) is then split by the chunker,
    /// the statistic is computed per chunk and the threshold turns those
    /// values into alert bounds.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error when the method does not support
    /// the column's feature type or holds infinite values,
    /// [`Error::EmptyColumn`] when the column has no non-missing values, and
    /// any chunker error.
    pub fn fit(&self, reference: &Column, timestamps: Option<&Column>) -> Result<FittedMethod> {
        let feature_type = reference.feature_type()?;
        if !self.kind.supports(feature_type) {
            return Err(Error::invalid_arguments(format!(
                "method '{}' does not support {feature_type} column '{}'",
                self.kind.key(),
                reference.name()
            )));
        }

        debug!(
            method = %self.display_name,
            column = reference.name(),
            rows = reference.len(),
            "fitting drift method"
        );

        let values = reference.values()?;
        let state = self.fit_reference(&values, reference.name())?;

        let mut fitted = FittedMethod {
            method: self.clone(),
            reference: state,
            feature_type,
            lower_threshold: None,
            upper_threshold: None,
            last_p_value: None,
        };

        let chunk_values = fitted.reference_chunk_values(reference, timestamps)?;
        let (lower, upper) = calculate_threshold_values(
            &self.threshold,
            &chunk_values,
            self.threshold_limits(),
            false,
            &self.display_name,
        );
        fitted.lower_threshold = lower;
        fitted.upper_threshold = upper;

        Ok(fitted)
    }

    fn fit_reference(&self, values: &Values, column: &str) -> Result<Reference> {
        let ComputationParams {
            calculation_method,
            n_bins,
        } = self.computation;

        Ok(match self.kind {
            MethodKind::JensenShannon | MethodKind::Hellinger => {
                Reference::Binned(BinnedReference::fit(values, &self.cardinality, column)?)
            }
            MethodKind::KolmogorovSmirnov => Reference::KolmogorovSmirnov(KsReference::fit(
                numeric(values, column)?,
                calculation_method,
                n_bins,
                column,
            )?),
            MethodKind::Wasserstein => Reference::Wasserstein(WassersteinReference::fit(
                numeric(values, column)?,
                calculation_method,
                n_bins,
                column,
            )?),
            MethodKind::Chi2 => {
                Reference::Chi2(Chi2Reference::fit(labels(values, column)?, column)?)
            }
            MethodKind::LInfinity => {
                Reference::LInfinity(LInfinityReference::fit(labels(values, column)?, column)?)
            }
        })
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.display_name == other.display_name && self.column_name == other.column_name
    }
}

fn numeric<'a>(values: &'a Values, column: &str) -> Result<&'a [f64]> {
    match values {
        Values::Numeric(v) => Ok(v),
        Values::Categorical(_) => Err(Error::schema_mismatch(format!(
            "column '{column}' holds categorical data where numeric data was expected"
        ))),
    }
}

fn labels<'a>(values: &'a Values, column: &str) -> Result<&'a [String]> {
    match values {
        Values::Categorical(v) => Ok(v),
        Values::Numeric(_) => Err(Error::schema_mismatch(format!(
            "column '{column}' holds numeric data where categorical data was expected"
        ))),
    }
}

/// Reference distribution state, one variant per family of statistics.
#[derive(Debug, Clone, PartialEq)]
enum Reference {
    Binned(BinnedReference),
    KolmogorovSmirnov(KsReference),
    Wasserstein(WassersteinReference),
    Chi2(Chi2Reference),
    LInfinity(LInfinityReference),
}

/// A statistic value together with its p-value, if the statistic is a test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Statistic value
    pub value: f64,
    /// P-value of the test, chi-squared only
    pub p_value: Option<f64>,
}

/// A drift method fitted on reference data.
///
/// Thresholds are fixed at fit time; calculations never change them.
#[derive(Debug, Clone)]
pub struct FittedMethod {
    method: Method,
    reference: Reference,
    feature_type: FeatureType,
    lower_threshold: Option<f64>,
    upper_threshold: Option<f64>,
    last_p_value: Option<f64>,
}

impl FittedMethod {
    /// The configuration this method was fitted from.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Statistic computed by the method.
    pub fn kind(&self) -> MethodKind {
        self.method.kind
    }

    /// Human readable name.
    pub fn display_name(&self) -> &str {
        &self.method.display_name
    }

    /// Result column name.
    pub fn column_name(&self) -> &str {
        &self.method.column_name
    }

    /// Feature type of the reference column.
    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    /// Feature type the reference data is treated as.
    ///
    /// Differs from [`Self::feature_type`] when low cardinality numeric data
    /// is handled as labels by Jensen-Shannon or Hellinger.
    pub fn treated_as(&self) -> FeatureType {
        match &self.reference {
            Reference::Binned(binned) => binned.treated_as(),
            _ => self.feature_type,
        }
    }

    /// Exact or estimated, for KS and Wasserstein.
    pub fn resolved_calculation(&self) -> Option<CalculationMethod> {
        match &self.reference {
            Reference::KolmogorovSmirnov(ks) => Some(ks.calculation_method()),
            Reference::Wasserstein(w) => Some(w.calculation_method()),
            _ => None,
        }
    }

    /// Lower alert threshold. Always `None` for p-value based alerting.
    pub fn lower_threshold(&self) -> Option<f64> {
        match self.kind().alert_rule() {
            AlertRule::ThresholdBand => self.lower_threshold,
            AlertRule::PValueBelow(_) => None,
        }
    }

    /// Upper alert threshold. Always `None` for p-value based alerting.
    pub fn upper_threshold(&self) -> Option<f64> {
        match self.kind().alert_rule() {
            AlertRule::ThresholdBand => self.upper_threshold,
            AlertRule::PValueBelow(_) => None,
        }
    }

    /// P-value recorded by the last [`Self::calculate`] call.
    pub fn last_p_value(&self) -> Option<f64> {
        self.last_p_value
    }

    /// Computes the statistic on a column without touching any state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyColumn`] when the column has no non-missing
    /// values, a schema mismatch when its type differs from the reference,
    /// and an invalid arguments error for infinite values.
    pub fn measure(&self, data: &Column) -> Result<Measurement> {
        let values = data.values()?;
        let column = data.name();

        let value = match &self.reference {
            Reference::Binned(binned) => match self.kind() {
                MethodKind::Hellinger => hellinger::calculate(binned, &values, column)?,
                _ => jensen_shannon::calculate(binned, &values, column)?,
            },
            Reference::KolmogorovSmirnov(ks) => ks.statistic(numeric(&values, column)?, column)?,
            Reference::Wasserstein(w) => w.distance(numeric(&values, column)?, column)?,
            Reference::LInfinity(l) => l.distance(labels(&values, column)?, column)?,
            Reference::Chi2(chi2) => {
                let test = chi2.test(labels(&values, column)?, column)?;
                return Ok(Measurement {
                    value: test.statistic,
                    p_value: Some(test.p_value),
                });
            }
        };

        Ok(Measurement {
            value,
            p_value: None,
        })
    }

    /// Computes the statistic on a column.
    ///
    /// The p-value of a chi-squared test is kept for [`Self::alert`].
    pub fn calculate(&mut self, data: &Column) -> Result<f64> {
        debug!(
            method = %self.method.display_name,
            column = data.name(),
            rows = data.len(),
            "calculating drift"
        );
        let measurement = self.measure(data)?;
        if measurement.p_value.is_some() {
            self.last_p_value = measurement.p_value;
        }
        Ok(measurement.value)
    }

    /// Returns true if the value should raise an alert.
    ///
    /// P-value based methods ignore `value` and look at the p-value of the
    /// last calculation; without one they never alert.
    pub fn alert(&self, value: f64) -> bool {
        match self.kind().alert_rule() {
            AlertRule::ThresholdBand => {
                !value.is_nan()
                    && (self.lower_threshold.is_some_and(|lower| value < lower)
                        || self.upper_threshold.is_some_and(|upper| value > upper))
            }
            AlertRule::PValueBelow(alpha) => self.last_p_value.is_some_and(|p| p < alpha),
        }
    }

    /// Statistic values on the reference chunks.
    ///
    /// A chunk without non-missing values contributes NaN, which the
    /// threshold ignores.
    fn reference_chunk_values(
        &self,
        reference: &Column,
        timestamps: Option<&Column>,
    ) -> Result<Vec<f64>> {
        let mut columns = vec![reference.clone()];
        if let Some(ts) = timestamps {
            if ts.name() == reference.name() {
                return Err(Error::invalid_arguments(format!(
                    "timestamp column and reference column share the name '{}'",
                    ts.name()
                )));
            }
            columns.push(ts.clone());
        }
        let data = ArrowDataset::from_columns(columns)?;

        self.method
            .chunker
            .split(&data)?
            .iter()
            .map(|chunk| match self.measure(&chunk.column(reference.name())?) {
                Ok(m) => Ok(m.value),
                Err(Error::EmptyColumn { column }) => {
                    warn!(
                        method = %self.method.display_name,
                        column = %column,
                        chunk = %chunk.key,
                        "reference chunk has no non-missing values"
                    );
                    Ok(f64::NAN)
                }
                Err(e) => Err(e),
            })
            .collect()
    }
}

impl PartialEq for FittedMethod {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
    }
}
