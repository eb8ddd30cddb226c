//! Jensen-Shannon distance
//!
//! Base 2 Jensen-Shannon distance, the square root of the Jensen-Shannon
//! divergence. It is symmetric, always finite and bounded by `[0, 1]`.

use crate::{column::Values, drift::binning::BinnedReference, error::Result};

/// `x * ln(x / y)` with the limits used for relative entropy.
fn rel_entr(x: f64, y: f64) -> f64 {
    if x > 0.0 && y > 0.0 {
        x * (x / y).ln()
    } else if x == 0.0 && y >= 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

/// Jensen-Shannon distance between two probability vectors.
///
/// Both vectors are normalized first. Returns NaN when either sums to zero.
///
/// # Example
///
/// ```
/// use vigilar::drift::jensen_shannon_distance;
///
/// assert_eq!(jensen_shannon_distance(&[0.5, 0.5], &[0.5, 0.5]), 0.0);
/// assert!((jensen_shannon_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-12);
/// ```
pub fn jensen_shannon_distance(p: &[f64], q: &[f64]) -> f64 {
    let p_sum: f64 = p.iter().sum();
    let q_sum: f64 = q.iter().sum();

    let divergence: f64 = p
        .iter()
        .zip(q)
        .map(|(pi, qi)| {
            let (pi, qi) = (pi / p_sum, qi / q_sum);
            let mi = (pi + qi) / 2.0;
            rel_entr(pi, mi) + rel_entr(qi, mi)
        })
        .sum::<f64>()
        / std::f64::consts::LN_2;

    (divergence / 2.0).max(0.0).sqrt().min(1.0)
}

pub(crate) fn calculate(reference: &BinnedReference, data: &Values, column: &str) -> Result<f64> {
    let (p, q) = reference.distributions(data, column)?;
    Ok(jensen_shannon_distance(&p, &q))
}
