// Allow casts for count to probability conversions
#![allow(clippy::cast_precision_loss)]

//! Two-sample Kolmogorov-Smirnov statistic
//!
//! Small references keep the raw sample and compute the exact statistic.
//! Large references are reduced to a cumulative histogram over equal width
//! bins, bounding memory and time regardless of the reference size.

use crate::{
    drift::{binning, CalculationMethod},
    error::{Error, Result},
};

/// Exact two-sample KS statistic: the largest absolute difference between
/// the two empirical CDFs.
///
/// Returns NaN when either sample is empty.
///
/// # Example
///
/// ```
/// use vigilar::drift::ks_statistic;
///
/// assert_eq!(ks_statistic(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
/// assert_eq!(ks_statistic(&[1.0, 2.0], &[3.0, 4.0]), 1.0);
/// ```
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    ks_statistic_sorted(&a, &b)
}

fn ks_statistic_sorted(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::NAN;
    }

    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut stat: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        stat = stat.max((i as f64 / n - j as f64 / m).abs());
    }

    stat
}

/// Fitted reference state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KsReference {
    Exact {
        sorted: Vec<f64>,
    },
    Estimated {
        edges: Vec<f64>,
        cumulative: Vec<f64>,
    },
}

impl KsReference {
    pub(crate) fn fit(
        values: &[f64],
        calculation_method: CalculationMethod,
        n_bins: usize,
        column: &str,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::empty_column(column));
        }

        match calculation_method.resolve(values.len()) {
            CalculationMethod::Estimated => {
                if n_bins == 0 {
                    return Err(Error::invalid_arguments("n_bins must be positive"));
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let edges = binning::linspace(min, max, n_bins + 1);
                let cumulative = cumulative_frequencies(
                    &binning::histogram(values, &edges),
                    0.0,
                    values.len(),
                );
                Ok(Self::Estimated { edges, cumulative })
            }
            _ => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                Ok(Self::Exact { sorted })
            }
        }
    }

    pub(crate) fn calculation_method(&self) -> CalculationMethod {
        match self {
            Self::Exact { .. } => CalculationMethod::Exact,
            Self::Estimated { .. } => CalculationMethod::Estimated,
        }
    }

    pub(crate) fn statistic(&self, data: &[f64], column: &str) -> Result<f64> {
        if data.is_empty() {
            return Err(Error::empty_column(column));
        }

        match self {
            Self::Exact { sorted } => {
                let mut data = data.to_vec();
                data.sort_by(f64::total_cmp);
                Ok(ks_statistic_sorted(sorted, &data))
            }
            Self::Estimated { edges, cumulative } => {
                let below = edges
                    .first()
                    .map_or(0, |first| data.iter().filter(|v| *v < first).count());
                let chunk = cumulative_frequencies(
                    &binning::histogram(data, edges),
                    below as f64 / data.len() as f64,
                    data.len(),
                );
                Ok(cumulative
                    .iter()
                    .zip(&chunk)
                    .map(|(r, c)| (r - c).abs())
                    .fold(0.0, f64::max))
            }
        }
    }
}

fn cumulative_frequencies(counts: &[usize], offset: f64, total: usize) -> Vec<f64> {
    counts
        .iter()
        .scan(0.0_f64, |acc, c| {
            *acc += *c as f64 / total as f64;
            Some(offset + *acc)
        })
        .collect()
}
