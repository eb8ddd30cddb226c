//! Alert thresholds derived from reference chunk values
//!
//! A [`Threshold`] turns the values a metric takes on the reference chunks
//! into a lower and upper alert bound. [`calculate_threshold_values`] then
//! clips those bounds to the hard [`ThresholdLimits`] of the metric, e.g. a
//! distance can never have a negative lower threshold.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Strategy for deriving alert bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Threshold {
    /// Fixed bounds, independent of the reference data.
    Constant {
        /// Lower bound, if any
        #[serde(default)]
        lower: Option<f64>,
        /// Upper bound, if any
        #[serde(default)]
        upper: Option<f64>,
    },
    /// Mean of the reference chunk values plus or minus a multiple of their
    /// standard deviation.
    StandardDeviation {
        /// Multiplier below the mean; `None` disables the lower bound
        #[serde(default = "default_multiplier")]
        std_lower_multiplier: Option<f64>,
        /// Multiplier above the mean; `None` disables the upper bound
        #[serde(default = "default_multiplier")]
        std_upper_multiplier: Option<f64>,
    },
}

#[allow(clippy::unnecessary_wraps)]
fn default_multiplier() -> Option<f64> {
    Some(3.0)
}

impl Default for Threshold {
    fn default() -> Self {
        Self::standard_deviation()
    }
}

impl Threshold {
    /// Constant threshold.
    pub fn constant(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self::Constant { lower, upper }
    }

    /// Standard deviation threshold with multipliers of 3 on both sides.
    pub fn standard_deviation() -> Self {
        Self::StandardDeviation {
            std_lower_multiplier: default_multiplier(),
            std_upper_multiplier: default_multiplier(),
        }
    }

    /// Computes raw (unclipped) bounds from reference chunk values.
    ///
    /// NaN values are ignored. With no finite data the standard deviation
    /// strategy yields no bounds.
    pub fn thresholds(&self, data: &[f64]) -> (Option<f64>, Option<f64>) {
        match self {
            Self::Constant { lower, upper } => (*lower, *upper),
            Self::StandardDeviation {
                std_lower_multiplier,
                std_upper_multiplier,
            } => {
                let values: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
                if values.is_empty() {
                    return (None, None);
                }
                #[allow(clippy::cast_precision_loss)]
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

                (
                    std_lower_multiplier.map(|m| mean - m * std),
                    std_upper_multiplier.map(|m| mean + m * std),
                )
            }
        }
    }
}

/// Hard bounds a computed threshold may never cross.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdLimits {
    /// Lowest admissible lower threshold
    pub lower: Option<f64>,
    /// Highest admissible upper threshold
    pub upper: Option<f64>,
}

impl ThresholdLimits {
    /// Creates limits.
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    /// Lower limit of zero, no upper limit.
    pub fn non_negative() -> Self {
        Self::new(Some(0.0), None)
    }

    /// Limits of zero and one.
    pub fn unit_interval() -> Self {
        Self::new(Some(0.0), Some(1.0))
    }
}

/// Computes threshold values for a metric and clips them to its limits.
///
/// A bound crossing its limit is replaced by the limit, or removed entirely
/// when `override_using_none` is set. Either way a warning is logged.
pub fn calculate_threshold_values(
    threshold: &Threshold,
    data: &[f64],
    limits: ThresholdLimits,
    override_using_none: bool,
    metric_name: &str,
) -> (Option<f64>, Option<f64>) {
    let (mut lower, mut upper) = threshold.thresholds(data);

    if let (Some(value), Some(limit)) = (lower, limits.lower) {
        if value < limit {
            let replacement = if override_using_none { None } else { Some(limit) };
            warn!(
                metric = metric_name,
                lower_threshold = value,
                limit,
                "lower threshold value exceeds the lower threshold limit, overriding with {:?}",
                replacement
            );
            lower = replacement;
        }
    }

    if let (Some(value), Some(limit)) = (upper, limits.upper) {
        if value > limit {
            let replacement = if override_using_none { None } else { Some(limit) };
            warn!(
                metric = metric_name,
                upper_threshold = value,
                limit,
                "upper threshold value exceeds the upper threshold limit, overriding with {:?}",
                replacement
            );
            upper = replacement;
        }
    }

    (lower, upper)
}
