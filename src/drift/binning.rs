// Allow casts for count to probability conversions
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! Histogram helpers shared by the binned drift methods
//!
//! Bin semantics follow the usual histogram convention: every bin is
//! half-open `[a, b)` except the last, which also includes its right edge.
//! Values outside the outer edges are not counted.

use std::collections::BTreeMap;

use crate::{
    column::{FeatureType, Values},
    drift::CardinalityRule,
    error::{Error, Result},
};

/// `num` evenly spaced values from `start` to `stop`, both included.
pub(crate) fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut out: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            out[num - 1] = stop;
            out
        }
    }
}

/// Bin index of `value`, or `None` if it lies outside the edges.
pub(crate) fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    let (first, last) = (*edges.first()?, *edges.last()?);
    if edges.len() < 2 || value < first || value > last {
        return None;
    }
    let bins = edges.len() - 1;
    let upper = edges.partition_point(|e| *e <= value);
    Some(upper.saturating_sub(1).min(bins - 1))
}

/// Counts of `values` per bin.
pub(crate) fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let mut counts = vec![0; edges.len().saturating_sub(1)];
    for value in values {
        if let Some(i) = bin_index(edges, *value) {
            counts[i] += 1;
        }
    }
    counts
}

/// Outer edges spanning the data, widened by half a unit when degenerate.
pub(crate) fn outer_edges(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    if min == max {
        Some((min - 0.5, max + 0.5))
    } else {
        Some((min, max))
    }
}

/// Equal width edges of `n_bins` bins over the data range.
pub(crate) fn equal_width_edges(values: &[f64], n_bins: usize) -> Option<Vec<f64>> {
    let (first, last) = outer_edges(values)?;
    Some(linspace(first, last, n_bins + 1))
}

/// Bin edges by Doane's rule, a Sturges refinement accounting for skew.
pub(crate) fn doane_bin_edges(values: &[f64]) -> Option<Vec<f64>> {
    let (first, last) = outer_edges(values)?;
    let width = doane_bin_width(values);
    let n_bins = if width > 0.0 {
        (((last - first) / width).ceil() as usize).max(1)
    } else {
        1
    };
    Some(linspace(first, last, n_bins + 1))
}

fn doane_bin_width(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() <= 2 {
        return 0.0;
    }

    let sg1 = (6.0 * (n - 2.0) / ((n + 1.0) * (n + 3.0))).sqrt();
    let mean = values.iter().sum::<f64>() / n;
    let sigma = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if sigma <= 0.0 {
        return 0.0;
    }

    let g1 = values
        .iter()
        .map(|v| ((v - mean) / sigma).powi(3))
        .sum::<f64>()
        / n;
    let ptp = values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - values.iter().copied().fold(f64::INFINITY, f64::min);

    ptp / (1.0 + n.log2() + (1.0 + g1.abs() / sg1).log2())
}

/// Distinct values of a sorted slice with their counts.
fn unique_counts(sorted: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut labels: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for value in sorted {
        match labels.last() {
            Some(last) if last.total_cmp(value).is_eq() => {
                if let Some(c) = counts.last_mut() {
                    *c += 1;
                }
            }
            _ => {
                labels.push(*value);
                counts.push(1);
            }
        }
    }
    (labels, counts)
}

fn proportions(counts: &[usize], total: usize) -> Vec<f64> {
    counts.iter().map(|c| *c as f64 / total as f64).collect()
}

/// Reference distribution over bins or labels, shared by Jensen-Shannon and
/// Hellinger.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BinnedReference {
    /// Numeric data treated as continuous, binned by Doane's rule
    Continuous { edges: Vec<f64>, proba: Vec<f64> },
    /// Low cardinality numeric data treated as categorical
    NumericLabels { labels: Vec<f64>, proba: Vec<f64> },
    /// Categorical labels
    Labels { labels: Vec<String>, proba: Vec<f64> },
}

impl BinnedReference {
    /// Learns the reference distribution from missing-free values.
    pub(crate) fn fit(values: &Values, rule: &CardinalityRule, column: &str) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::empty_column(column));
        }

        match values {
            Values::Categorical(labels) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for label in labels {
                    *counts.entry(label.as_str()).or_default() += 1;
                }
                let proba = counts
                    .values()
                    .map(|c| *c as f64 / labels.len() as f64)
                    .collect();
                Ok(Self::Labels {
                    labels: counts.keys().map(|k| (*k).to_string()).collect(),
                    proba,
                })
            }
            Values::Numeric(numbers) => {
                if rule.treat_as(values) == FeatureType::Continuous {
                    let edges =
                        doane_bin_edges(numbers).ok_or_else(|| Error::empty_column(column))?;
                    let proba = proportions(&histogram(numbers, &edges), numbers.len());
                    Ok(Self::Continuous { edges, proba })
                } else {
                    let mut sorted = numbers.clone();
                    sorted.sort_by(f64::total_cmp);
                    let (labels, counts) = unique_counts(&sorted);
                    Ok(Self::NumericLabels {
                        labels,
                        proba: proportions(&counts, numbers.len()),
                    })
                }
            }
        }
    }

    /// How the reference was treated.
    pub(crate) fn treated_as(&self) -> FeatureType {
        match self {
            Self::Continuous { .. } => FeatureType::Continuous,
            Self::NumericLabels { .. } | Self::Labels { .. } => FeatureType::Categorical,
        }
    }

    /// Reference and data probability vectors over the reference bins.
    ///
    /// Data mass outside every reference bin or label goes into one extra
    /// bin whose reference probability is zero.
    pub(crate) fn distributions(
        &self,
        data: &Values,
        column: &str,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        if data.is_empty() {
            return Err(Error::empty_column(column));
        }

        let (reference, counts) = match (self, data) {
            (Self::Continuous { edges, proba }, Values::Numeric(numbers)) => {
                (proba, histogram(numbers, edges))
            }
            (Self::NumericLabels { labels, proba }, Values::Numeric(numbers)) => {
                let mut counts = vec![0; labels.len()];
                for value in numbers {
                    if let Ok(i) = labels.binary_search_by(|l| l.total_cmp(value)) {
                        counts[i] += 1;
                    }
                }
                (proba, counts)
            }
            (Self::Labels { labels, proba }, Values::Categorical(strings)) => {
                let mut counts = vec![0; labels.len()];
                for value in strings {
                    if let Ok(i) = labels.binary_search_by(|l| l.as_str().cmp(value.as_str())) {
                        counts[i] += 1;
                    }
                }
                (proba, counts)
            }
            _ => {
                return Err(Error::schema_mismatch(format!(
                    "column '{column}' was fitted as {} data but received {} data",
                    self.source_type(),
                    data.feature_type()
                )))
            }
        };

        let mut reference = reference.clone();
        let mut data_proba = proportions(&counts, data.len());
        let leftover = data.len() - counts.iter().sum::<usize>();
        if leftover > 0 {
            data_proba.push(leftover as f64 / data.len() as f64);
            reference.push(0.0);
        }

        Ok((reference, data_proba))
    }

    fn source_type(&self) -> FeatureType {
        match self {
            Self::Continuous { .. } | Self::NumericLabels { .. } => FeatureType::Continuous,
            Self::Labels { .. } => FeatureType::Categorical,
        }
    }
}
