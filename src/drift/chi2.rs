// Allow casts for count conversions
#![allow(clippy::cast_precision_loss)]

//! Chi-squared test of independence between reference and analysis labels

use std::collections::BTreeMap;

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{Error, Result};

/// Outcome of a contingency test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chi2Test {
    /// Pearson chi-squared statistic
    pub statistic: f64,
    /// Probability of a statistic at least this large under independence
    pub p_value: f64,
    /// Degrees of freedom
    pub dof: usize,
}

/// Chi-squared test on a `k x 2` table of label counts.
///
/// Each row holds the reference and analysis count of one label. With a
/// single degree of freedom Yates' continuity correction is applied. A
/// table with one row has no degrees of freedom and yields a statistic of 0
/// with p-value 1.
///
/// # Errors
///
/// Returns a statistics error when a row or column of the table sums to
/// zero.
pub fn chi2_contingency(table: &[[f64; 2]]) -> Result<Chi2Test> {
    let row_sums: Vec<f64> = table.iter().map(|r| r[0] + r[1]).collect();
    let col_sums = [
        table.iter().map(|r| r[0]).sum::<f64>(),
        table.iter().map(|r| r[1]).sum::<f64>(),
    ];
    let total = col_sums[0] + col_sums[1];

    if table.is_empty() || row_sums.iter().chain(&col_sums).any(|s| *s <= 0.0) {
        return Err(Error::statistics(
            "contingency table has a zero expected frequency",
        ));
    }

    let dof = table.len() - 1;
    if dof == 0 {
        return Ok(Chi2Test {
            statistic: 0.0,
            p_value: 1.0,
            dof,
        });
    }

    let mut statistic = 0.0;
    for (row, row_sum) in table.iter().zip(&row_sums) {
        for (observed, col_sum) in row.iter().zip(&col_sums) {
            let expected = row_sum * col_sum / total;
            let mut observed = *observed;
            if dof == 1 {
                let diff = expected - observed;
                observed += diff.abs().min(0.5) * diff.signum();
            }
            statistic += (observed - expected).powi(2) / expected;
        }
    }

    let distribution = ChiSquared::new(dof as f64).map_err(|e| Error::statistics(e.to_string()))?;

    Ok(Chi2Test {
        statistic,
        p_value: distribution.sf(statistic),
        dof,
    })
}

/// Fitted reference label counts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Chi2Reference {
    counts: BTreeMap<String, usize>,
}

fn value_counts(labels: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label.clone()).or_insert(0) += 1;
    }
    counts
}

impl Chi2Reference {
    pub(crate) fn fit(labels: &[String], column: &str) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::empty_column(column));
        }
        Ok(Self {
            counts: value_counts(labels),
        })
    }

    pub(crate) fn test(&self, labels: &[String], column: &str) -> Result<Chi2Test> {
        if labels.is_empty() {
            return Err(Error::empty_column(column));
        }

        let data = value_counts(labels);
        let mut keys: Vec<&String> = self.counts.keys().chain(data.keys()).collect();
        keys.sort();
        keys.dedup();

        let table: Vec<[f64; 2]> = keys
            .iter()
            .map(|k| {
                [
                    self.counts.get(*k).copied().unwrap_or(0) as f64,
                    data.get(*k).copied().unwrap_or(0) as f64,
                ]
            })
            .collect();

        chi2_contingency(&table)
    }
}
