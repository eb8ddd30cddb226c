// Allow casts for count to probability conversions
#![allow(clippy::cast_precision_loss)]

//! L-Infinity distance between label frequencies

use std::collections::BTreeMap;

use crate::error::{Error, Result};

fn proportions(labels: &[String]) -> BTreeMap<&str, f64> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / labels.len() as f64))
        .collect()
}

/// Fitted reference label probabilities.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LInfinityReference {
    proba: BTreeMap<String, f64>,
}

impl LInfinityReference {
    pub(crate) fn fit(labels: &[String], column: &str) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::empty_column(column));
        }
        Ok(Self {
            proba: proportions(labels)
                .into_iter()
                .map(|(label, p)| (label.to_string(), p))
                .collect(),
        })
    }

    /// Largest absolute per-label probability difference over the union of
    /// labels. A label absent on one side counts as probability 0 there.
    pub(crate) fn distance(&self, labels: &[String], column: &str) -> Result<f64> {
        if labels.is_empty() {
            return Err(Error::empty_column(column));
        }

        let data = proportions(labels);
        let from_reference = self
            .proba
            .iter()
            .map(|(label, p)| (p - data.get(label.as_str()).copied().unwrap_or(0.0)).abs());
        let from_data = data
            .iter()
            .filter(|(label, _)| !self.proba.contains_key(**label))
            .map(|(_, p)| *p);

        Ok(from_reference.chain(from_data).fold(0.0, f64::max))
    }
}
