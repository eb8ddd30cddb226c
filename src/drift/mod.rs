//! Univariate drift detection
//!
//! Six statistics compare the distribution of one column in analysis data
//! against the same column in reference data:
//!
//! | Key                  | Statistic                     | Feature types            |
//! |----------------------|-------------------------------|--------------------------|
//! | `jensen_shannon`     | Jensen-Shannon distance       | continuous, categorical  |
//! | `hellinger`          | Hellinger distance            | continuous, categorical  |
//! | `kolmogorov_smirnov` | Kolmogorov-Smirnov statistic  | continuous               |
//! | `wasserstein`        | Wasserstein distance          | continuous               |
//! | `chi2`               | Chi-squared statistic         | categorical              |
//! | `l_infinity`         | L-Infinity distance           | categorical              |
//!
//! A [`Method`] is an unfit configuration. Fitting it on a reference column
//! yields a [`FittedMethod`] holding the reference distribution and the
//! alert thresholds derived from the reference chunks. Methods are created
//! by key through a [`MethodRegistry`], and the
//! [`UnivariateDriftCalculator`] runs them over every monitored column.
//!
//! # Example
//!
//! ```
//! use vigilar::drift::{Method, MethodKind};
//! use vigilar::{Column, SizeBasedChunker};
//!
//! let reference = Column::from_f64("x", (0..1000).map(|i| f64::from(i % 100)).collect());
//! let method = Method::new(MethodKind::KolmogorovSmirnov)
//!     .with_chunker(SizeBasedChunker::new(100));
//! let mut fitted = method.fit(&reference, None).unwrap();
//!
//! let shifted = Column::from_f64("x", (0..100).map(|i| f64::from(i) + 50.0).collect());
//! let value = fitted.calculate(&shifted).unwrap();
//! assert!(value > 0.4);
//! assert!(fitted.alert(value));
//! ```

mod binning;
mod calculator;
mod chi2;
mod hellinger;
mod jensen_shannon;
mod kolmogorov_smirnov;
mod l_infinity;
mod method;
mod registry;
mod wasserstein;

use serde::{Deserialize, Serialize};

pub use calculator::{FittedUnivariateDriftCalculator, UnivariateDriftCalculator};
pub use chi2::{chi2_contingency, Chi2Test};
pub use hellinger::hellinger_distance;
pub use jensen_shannon::jensen_shannon_distance;
pub use kolmogorov_smirnov::ks_statistic;
pub use method::{AlertRule, FittedMethod, Measurement, Method, MethodKind, MethodParams};
pub use registry::{MethodConstructor, MethodRegistry, MethodRegistryBuilder};
pub use wasserstein::wasserstein_distance;

use crate::column::{FeatureType, Values};

/// Reference size from which `Auto` switches to estimated computation.
pub const EXACT_REFERENCE_SIZE_LIMIT: usize = 10_000;

/// Default number of bins for estimated computation.
pub const DEFAULT_N_BINS: usize = 10_000;

/// How KS and Wasserstein compute their statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// Exact below [`EXACT_REFERENCE_SIZE_LIMIT`] reference values,
    /// estimated otherwise
    #[default]
    Auto,
    /// Keep the raw reference sample
    Exact,
    /// Keep a histogram of the reference sample
    Estimated,
}

impl CalculationMethod {
    /// Resolves `Auto` for a reference of the given size.
    pub fn resolve(self, reference_size: usize) -> Self {
        match self {
            Self::Auto if reference_size < EXACT_REFERENCE_SIZE_LIMIT => Self::Exact,
            Self::Auto => Self::Estimated,
            other => other,
        }
    }
}

/// Computation settings of KS and Wasserstein.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputationParams {
    /// Exact, estimated or automatic
    pub calculation_method: CalculationMethod,
    /// Number of bins used in estimated mode
    pub n_bins: usize,
}

impl Default for ComputationParams {
    fn default() -> Self {
        Self {
            calculation_method: CalculationMethod::Auto,
            n_bins: DEFAULT_N_BINS,
        }
    }
}

/// Decides whether numeric data is binned or treated as labels.
///
/// Integer encoded categoricals have few distinct values; binning them
/// would smear their mass over empty bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CardinalityRule {
    /// Continuous treatment needs more distinct values than this
    pub max_unique: usize,
    /// ... and a distinct value ratio above this
    pub min_unique_ratio: f64,
}

impl Default for CardinalityRule {
    fn default() -> Self {
        Self {
            max_unique: 50,
            min_unique_ratio: 0.1,
        }
    }
}

impl CardinalityRule {
    /// Feature type the values are treated as.
    #[allow(clippy::cast_precision_loss)]
    pub fn treat_as(&self, values: &Values) -> FeatureType {
        match values {
            Values::Categorical(_) => FeatureType::Categorical,
            Values::Numeric(v) if v.is_empty() => FeatureType::Categorical,
            Values::Numeric(v) => {
                let n_unique = values.n_unique();
                if n_unique > self.max_unique
                    && n_unique as f64 / v.len() as f64 > self.min_unique_ratio
                {
                    FeatureType::Continuous
                } else {
                    FeatureType::Categorical
                }
            }
        }
    }
}
