//! Hellinger distance

use crate::{column::Values, drift::binning::BinnedReference, error::Result};

/// Hellinger distance between two probability vectors, in `[0, 1]`.
pub fn hellinger_distance(p: &[f64], q: &[f64]) -> f64 {
    let sum: f64 = p
        .iter()
        .zip(q)
        .map(|(pi, qi)| (pi.sqrt() - qi.sqrt()).powi(2))
        .sum();
    (sum.sqrt() / std::f64::consts::SQRT_2).min(1.0)
}

pub(crate) fn calculate(reference: &BinnedReference, data: &Values, column: &str) -> Result<f64> {
    let (p, q) = reference.distributions(data, column)?;
    Ok(hellinger_distance(&p, &q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(hellinger_distance(&[0.3, 0.7], &[0.3, 0.7]), 0.0);
    }

    #[test]
    fn test_disjoint() {
        let d = hellinger_distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_value() {
        let d = hellinger_distance(&[0.5, 0.5], &[1.0, 0.0]);
        let expected = ((0.5_f64.sqrt() - 1.0).powi(2) + 0.5).sqrt() / 2.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_numeric_bins() {
        let reference = BinnedReference::Continuous {
            edges: vec![0.0, 1.0, 2.0],
            proba: vec![0.5, 0.5],
        };
        let shifted = Values::Numeric(vec![10.0, 11.0]);
        let d = calculate(&reference, &shifted, "x").unwrap();
        assert!((d - 1.0).abs() < 1e-12);
    }
}
