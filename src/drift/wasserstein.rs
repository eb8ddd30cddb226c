// Allow casts for count to probability conversions
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! First Wasserstein (earth mover's) distance
//!
//! Exact mode integrates the absolute difference of the two empirical CDFs.
//! Estimated mode works on a fixed histogram of the reference and extends
//! its grid by whole bin widths when analysis data falls outside it.

use crate::{
    drift::{binning, CalculationMethod},
    error::{Error, Result},
};

/// Exact first Wasserstein distance between two samples.
///
/// Returns NaN when either sample is empty.
///
/// # Example
///
/// ```
/// use vigilar::drift::wasserstein_distance;
///
/// let d = wasserstein_distance(&[0.0, 1.0, 3.0], &[5.0, 6.0, 8.0]);
/// assert!((d - 5.0).abs() < 1e-12);
/// ```
pub fn wasserstein_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    wasserstein_sorted(&a, &b)
}

fn wasserstein_sorted(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::NAN;
    }

    let mut all: Vec<f64> = a.iter().chain(b).copied().collect();
    all.sort_by(f64::total_cmp);

    let (n, m) = (a.len() as f64, b.len() as f64);
    all.windows(2)
        .map(|w| {
            let cdf_a = a.partition_point(|v| *v <= w[0]) as f64 / n;
            let cdf_b = b.partition_point(|v| *v <= w[0]) as f64 / m;
            (cdf_a - cdf_b).abs() * (w[1] - w[0])
        })
        .sum()
}

/// Fitted reference state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WassersteinReference {
    Exact {
        sorted: Vec<f64>,
    },
    Estimated {
        edges: Vec<f64>,
        rel_freqs: Vec<f64>,
        bin_width: f64,
    },
}

impl WassersteinReference {
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
                let edges = binning::equal_width_edges(values, n_bins)
                    .ok_or_else(|| Error::empty_column(column))?;
                let rel_freqs = binning::histogram(values, &edges)
                    .iter()
                    .map(|c| *c as f64 / values.len() as f64)
                    .collect();
                let bin_width = edges[1] - edges[0];
                Ok(Self::Estimated {
                    edges,
                    rel_freqs,
                    bin_width,
                })
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

    pub(crate) fn distance(&self, data: &[f64], column: &str) -> Result<f64> {
        if data.is_empty() {
            return Err(Error::empty_column(column));
        }

        match self {
            Self::Exact { sorted } => {
                let mut data = data.to_vec();
                data.sort_by(f64::total_cmp);
                Ok(wasserstein_sorted(sorted, &data))
            }
            Self::Estimated {
                edges,
                rel_freqs,
                bin_width,
            } => {
                let (edges, ref_pdf) = extend_grid(edges, rel_freqs, *bin_width, data)?;
                let chunk_pdf: Vec<f64> = binning::histogram(data, &edges)
                    .iter()
                    .map(|c| *c as f64 / data.len() as f64)
                    .collect();

                let mut ref_cdf = 0.0_f64;
                let mut chunk_cdf = 0.0_f64;
                let distance: f64 = ref_pdf
                    .iter()
                    .zip(&chunk_pdf)
                    .map(|(r, c)| {
                        ref_cdf += *r;
                        chunk_cdf += *c;
                        (ref_cdf - chunk_cdf).abs() * *bin_width
                    })
                    .sum();
                Ok(distance)
            }
        }
    }
}

/// Most bins the estimated grid may grow by on either side.
const MAX_EXTENSION_BINS: usize = 1 << 24;

/// Extends the reference grid by whole bins until it covers `data`.
///
/// New bins carry zero reference mass.
fn extend_grid(
    edges: &[f64],
    rel_freqs: &[f64],
    bin_width: f64,
    data: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let (Some(&first), Some(&last)) = (edges.first(), edges.last()) else {
        return Ok((edges.to_vec(), rel_freqs.to_vec()));
    };
    if bin_width <= 0.0 {
        return Ok((edges.to_vec(), rel_freqs.to_vec()));
    }

    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let left = if min < first {
        extension_bins(first - min, bin_width, |k| first - k * bin_width > min)?
    } else {
        0
    };
    let right = if max > last {
        extension_bins(max - last, bin_width, |k| last + k * bin_width < max)?
    } else {
        0
    };

    let mut out_edges = Vec::with_capacity(edges.len() + left + right);
    out_edges.extend((1..=left).rev().map(|k| first - k as f64 * bin_width));
    out_edges.extend_from_slice(edges);
    out_edges.extend((1..=right).map(|k| last + k as f64 * bin_width));

    let mut out_freqs = vec![0.0; left];
    out_freqs.extend_from_slice(rel_freqs);
    out_freqs.resize(out_freqs.len() + right, 0.0);

    Ok((out_edges, out_freqs))
}

/// Whole bins needed to span `gap`, bumped while `short(k)` still holds.
fn extension_bins(gap: f64, bin_width: f64, short: impl Fn(f64) -> bool) -> Result<usize> {
    let too_wide = || {
        Error::statistics(format!(
            "data lies more than {MAX_EXTENSION_BINS} bins outside the reference range"
        ))
    };

    let estimate = (gap / bin_width).ceil();
    if !estimate.is_finite() || estimate > MAX_EXTENSION_BINS as f64 {
        return Err(too_wide());
    }

    let mut bins = (estimate as usize).max(1);
    while short(bins as f64) {
        bins = bins
            .checked_add(1)
            .filter(|b| *b <= MAX_EXTENSION_BINS)
            .ok_or_else(too_wide)?;
    }
    Ok(bins)
}
