#![allow(clippy::unwrap_used)]
//! Property-based tests for the drift distances
//!
//! Uses proptest to check bounds, identity and symmetry across random
//! samples.

use proptest::prelude::*;
use vigilar::{
    drift::{hellinger_distance, jensen_shannon_distance, Method, MethodKind},
    Column, SizeBasedChunker,
};

fn numeric_sample() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-100.0f64..100.0, 20..200)
}

fn label_sample() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f]", 20..200)
}

fn probabilities() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (2usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(0.0f64..1.0, n),
            prop::collection::vec(0.0f64..1.0, n),
        )
    })
}

fn distance(kind: MethodKind, reference: &Column, data: &Column) -> f64 {
    let mut fitted = Method::new(kind)
        .with_chunker(SizeBasedChunker::new(10))
        .fit(reference, None)
        .unwrap();
    fitted.calculate(data).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY TESTS: Distance bounds
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    /// Property: binned distances stay within [0, 1] on numeric data
    #[test]
    fn prop_numeric_distances_bounded(reference in numeric_sample(), data in numeric_sample()) {
        let reference = Column::from_f64("x", reference);
        let data = Column::from_f64("x", data);
        for kind in [MethodKind::JensenShannon, MethodKind::Hellinger] {
            let d = distance(kind, &reference, &data);
            prop_assert!((0.0..=1.0).contains(&d), "{kind} gave {d}");
        }
    }

    /// Property: binned distances stay within [0, 1] on labels
    #[test]
    fn prop_label_distances_bounded(reference in label_sample(), data in label_sample()) {
        let reference = Column::from_strings("c", &reference);
        let data = Column::from_strings("c", &data);
        for kind in [MethodKind::JensenShannon, MethodKind::Hellinger] {
            let d = distance(kind, &reference, &data);
            prop_assert!((0.0..=1.0).contains(&d), "{kind} gave {d}");
        }
    }

    /// Property: a sample has zero distance to itself
    #[test]
    fn prop_identical_sample_zero_distance(values in numeric_sample()) {
        let column = Column::from_f64("x", values);
        for kind in [MethodKind::JensenShannon, MethodKind::Hellinger] {
            let d = distance(kind, &column, &column);
            prop_assert!(d.abs() < 1e-9, "{kind} gave {d}");
        }
    }

    /// Property: raw distances on probability vectors are bounded
    #[test]
    fn prop_raw_distances_bounded((p, q) in probabilities()) {
        prop_assume!(p.iter().sum::<f64>() > 0.0 && q.iter().sum::<f64>() > 0.0);
        let js = jensen_shannon_distance(&p, &q);
        prop_assert!((0.0..=1.0).contains(&js));

        let p_sum: f64 = p.iter().sum();
        let q_sum: f64 = q.iter().sum();
        let p: Vec<f64> = p.iter().map(|v| v / p_sum).collect();
        let q: Vec<f64> = q.iter().map(|v| v / q_sum).collect();
        let h = hellinger_distance(&p, &q);
        prop_assert!((0.0..=1.0).contains(&h));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY TESTS: Symmetry
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    /// Property: swapping reference and analysis labels keeps the distance
    #[test]
    fn prop_jensen_shannon_symmetric_on_labels(a in label_sample(), b in label_sample()) {
        let a = Column::from_strings("c", &a);
        let b = Column::from_strings("c", &b);
        let forward = distance(MethodKind::JensenShannon, &a, &b);
        let backward = distance(MethodKind::JensenShannon, &b, &a);
        prop_assert!((forward - backward).abs() < 1e-9);
    }

    /// Property: the raw distance is symmetric in its arguments
    #[test]
    fn prop_jensen_shannon_symmetric_raw((p, q) in probabilities()) {
        prop_assume!(p.iter().sum::<f64>() > 0.0 && q.iter().sum::<f64>() > 0.0);
        let forward = jensen_shannon_distance(&p, &q);
        let backward = jensen_shannon_distance(&q, &p);
        prop_assert!((forward - backward).abs() < 1e-12);
    }
}
