//! Scenario and property tests for weighted expectation and CVaR.

use ndarray::{array, Array1, Array3};
use proptest::prelude::*;
use tailwater::{
    compute_cvar, compute_cvar_batch, compute_weighted_cvar_batch, validate_monotonicity,
    EnsembleError, EnsembleTensor,
};

#[test]
fn two_run_single_cell_scenario() {
    // 2 runs, weights [0.5, 0.5], one basin, one year, values 100 and 200.
    let values: Array3<f64> = array![[[100.0]], [[200.0]]];
    let tensor = EnsembleTensor::new(values, vec![0, 1], array![0.5, 0.5]).unwrap();

    let cvar50 = compute_cvar(&tensor, 50.0).unwrap();
    assert!((cvar50[[0, 0]] - 100.0).abs() < 1e-12);

    let exp = tensor.expectation();
    assert!((exp[[0, 0]] - 150.0).abs() < 1e-12);
}

#[test]
fn degenerate_single_run_collapses_to_the_value() {
    let values = Array3::from_shape_fn((1, 3, 4), |(_, u, s)| (u * 4 + s) as f64 + 10.0);
    let tensor = EnsembleTensor::new(values.clone(), vec![0], array![1.0]).unwrap();

    let batch = compute_weighted_cvar_batch(&tensor, &[5.0, 25.0, 50.0, 95.0]).unwrap();
    for (_, plane) in batch.iter() {
        for ((u, s), &v) in plane.indexed_iter() {
            assert_eq!(v, values[[0, u, s]]);
        }
    }
    for ((u, s), &v) in batch.expectation().indexed_iter() {
        assert_eq!(v, values[[0, u, s]]);
    }
}

#[test]
fn strict_entry_point_enforces_weight_normalization() {
    let values: Array3<f64> = array![[[1.0]], [[2.0]], [[3.0]]];
    let tensor =
        EnsembleTensor::new(values, vec![0, 1, 2], array![0.2, 0.2, 0.2]).unwrap();
    let err = compute_weighted_cvar_batch(&tensor, &[10.0]).unwrap_err();
    assert!(matches!(err, EnsembleError::InvalidWeights { .. }));
}

#[test]
fn validator_accepts_well_conditioned_batches() {
    let values = Array3::from_shape_fn((12, 4, 6), |(r, u, s)| {
        100.0 + ((r * 31 + u * 7 + s * 13) % 97) as f64
    });
    let tensor = EnsembleTensor::with_uniform_weights(values, (0..12).collect()).unwrap();
    let batch = compute_weighted_cvar_batch(&tensor, &[10.0, 25.0, 50.0, 75.0, 90.0]).unwrap();
    let report = validate_monotonicity(&batch);
    assert!(report.is_valid(), "report: {report:?}");
}

/// Strategy: a non-degenerate ensemble with positive values and
/// normalized positive weights.
fn ensemble_strategy() -> impl Strategy<Value = EnsembleTensor> {
    (2usize..8, 1usize..4, 1usize..4)
        .prop_flat_map(|(r, b, t)| {
            (
                prop::collection::vec(1.0f64..1000.0, r * b * t),
                prop::collection::vec(0.01f64..1.0, r),
                Just((r, b, t)),
            )
        })
        .prop_map(|(values, raw_weights, (r, b, t))| {
            let values = Array3::from_shape_vec((r, b, t), values).unwrap();
            let total: f64 = raw_weights.iter().sum();
            let weights: Array1<f64> = raw_weights.into_iter().map(|w| w / total).collect();
            EnsembleTensor::new(values, (0..r as u64).collect(), weights).unwrap()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// For every cell and every pair of tail levels, CVaR must be
    /// non-decreasing in the level and bounded above by the expectation.
    #[test]
    fn prop_cvar_is_monotone_in_the_tail_level(tensor in ensemble_strategy()) {
        let levels = [5.0, 10.0, 25.0, 50.0, 75.0, 90.0];
        let batch = compute_cvar_batch(&tensor, &levels).unwrap();

        let planes: Vec<_> = batch.iter().map(|(_, p)| p).collect();
        for pair in planes.windows(2) {
            for (lo, hi) in pair[0].iter().zip(pair[1].iter()) {
                // Allow only floating-point wobble between near-equal means.
                prop_assert!(
                    *lo <= *hi + 1e-9 * hi.abs().max(1.0),
                    "cvar not monotone: {lo} > {hi}"
                );
            }
        }
        let last = planes.last().unwrap();
        for (cvar, exp) in last.iter().zip(batch.expectation().iter()) {
            prop_assert!(
                *cvar <= *exp + 1e-9 * exp.abs().max(1.0),
                "cvar {cvar} exceeds expectation {exp}"
            );
        }
    }

    /// CVaR of a cell never drops below the cell minimum.
    #[test]
    fn prop_cvar_is_bounded_below_by_the_minimum(tensor in ensemble_strategy()) {
        let cvar = compute_cvar(&tensor, 20.0).unwrap();
        for ((u, s), &v) in cvar.indexed_iter() {
            let min = (0..tensor.n_runs())
                .map(|r| tensor.values()[[r, u, s]])
                .fold(f64::INFINITY, f64::min);
            prop_assert!(v >= min - 1e-9, "cvar {v} below cell minimum {min}");
        }
    }

    /// The batch API must agree with the single-level API exactly.
    #[test]
    fn prop_batch_matches_single_level(tensor in ensemble_strategy()) {
        let batch = compute_cvar_batch(&tensor, &[15.0, 60.0]).unwrap();
        for &alpha in &[15.0, 60.0] {
            let single = compute_cvar(&tensor, alpha).unwrap();
            prop_assert_eq!(&single, batch.cvar(alpha).unwrap());
        }
    }
}
