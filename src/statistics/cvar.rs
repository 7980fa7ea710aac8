//! Weighted Conditional-Value-at-Risk over the run axis.
//!
//! CVaR_α of a cell is the weighted mean of the values in the lower tail
//! carrying cumulative weight ≤ α/100 ("worst = lowest", as for water
//! availability). Each (spatial-unit, time-step) cell is computed
//! independently: the tail membership of a run differs from cell to cell,
//! so this is not separable and is never approximated by summary
//! statistics taken once over the whole tensor.
//!
//! Sorting dominates the cost, so the batch API sorts each cell once and
//! reads every requested tail level from the same sorted buffer.

use ndarray::Array2;

use crate::constants::WEIGHT_SUM_TOLERANCE;
use crate::error::{EnsembleError, Result};
use crate::statistics::expectation::{warn_on_negative_cells, weighted_mean};
use crate::tensor::EnsembleTensor;

/// Expectation plus CVaR planes for a set of tail levels.
///
/// Planes are (B, T) arrays aligned with axes 1 and 2 of the input tensor.
/// Tail levels are kept in the order they were requested.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CvarBatch {
    expectation: Array2<f64>,
    alpha_levels: Vec<f64>,
    cvars: Vec<Array2<f64>>,
}

impl CvarBatch {
    /// The importance-weighted expectation plane.
    pub fn expectation(&self) -> &Array2<f64> {
        &self.expectation
    }

    /// The requested tail levels, in request order.
    pub fn alpha_levels(&self) -> &[f64] {
        &self.alpha_levels
    }

    /// The CVaR plane for a tail level, if it was requested.
    pub fn cvar(&self, alpha: f64) -> Option<&Array2<f64>> {
        self.alpha_levels
            .iter()
            .position(|&a| a == alpha)
            .map(|i| &self.cvars[i])
    }

    /// Iterate over `(alpha, plane)` pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &Array2<f64>)> {
        self.alpha_levels.iter().copied().zip(self.cvars.iter())
    }

    /// Iterate over `(label, plane)` pairs, with `"expectation"` first and
    /// then one `"cvar_<α>"` entry per tail level.
    pub fn labeled(&self) -> impl Iterator<Item = (String, &Array2<f64>)> {
        std::iter::once(("expectation".to_string(), &self.expectation)).chain(
            self.alpha_levels
                .iter()
                .map(|&a| tail_label(a))
                .zip(self.cvars.iter()),
        )
    }
}

/// Stable label for a tail level: `cvar_10`, `cvar_2.5`, ...
pub fn tail_label(alpha: f64) -> String {
    if alpha.fract() == 0.0 {
        format!("cvar_{}", alpha as i64)
    } else {
        format!("cvar_{alpha}")
    }
}

/// CVaR at a single tail level, per (spatial-unit, time-step) cell.
///
/// Per cell: sort the R values ascending carrying their weights, take the
/// cumulative weight sum, and average the values whose cumulative weight
/// lies at or below `alpha/100` (the run that crosses the threshold is
/// included). If even the smallest run's weight exceeds the threshold, the
/// cell's CVaR is its minimum value.
///
/// Weights are used as given; normalization is the caller's contract
/// (see [`compute_weighted_cvar_batch`] for the strict variant).
///
/// # Errors
///
/// - [`EnsembleError::InvalidTailLevel`] unless `0 < alpha < 100`.
/// - [`EnsembleError::ShapeMismatch`] if the tensor has no runs.
pub fn compute_cvar(tensor: &EnsembleTensor, alpha: f64) -> Result<Array2<f64>> {
    validate_tail_level(alpha)?;
    ensure_nonempty(tensor)?;

    let mut planes = cvar_planes(tensor, &[alpha]);
    let plane = planes.pop().expect("one plane per requested level");
    warn_on_negative_cells(&plane, "cvar");
    Ok(plane)
}

/// Expectation plus CVaR at several tail levels in one pass.
///
/// Each cell is sorted once and every tail level is read from the same
/// sorted buffer; with tail levels requested together this is R·log R per
/// cell instead of per (cell, level).
///
/// # Errors
///
/// - [`EnsembleError::InvalidTailLevel`] unless every level satisfies
///   `0 < alpha < 100`.
/// - [`EnsembleError::ShapeMismatch`] if the tensor has no runs.
pub fn compute_cvar_batch(tensor: &EnsembleTensor, alpha_levels: &[f64]) -> Result<CvarBatch> {
    for &alpha in alpha_levels {
        validate_tail_level(alpha)?;
    }
    ensure_nonempty(tensor)?;

    let expectation = weighted_mean(tensor.values().view(), tensor.weights().view())
        .expect("tensor weights are validated at construction");
    warn_on_negative_cells(&expectation, "expectation");

    let cvars = cvar_planes(tensor, alpha_levels);
    for plane in &cvars {
        warn_on_negative_cells(plane, "cvar");
    }

    Ok(CvarBatch {
        expectation,
        alpha_levels: alpha_levels.to_vec(),
        cvars,
    })
}

/// Strict composite entry point used by production callers.
///
/// Identical to [`compute_cvar_batch`] but additionally requires the
/// tensor's weights to sum to 1.0 within `1e-6`.
///
/// # Errors
///
/// [`EnsembleError::InvalidWeights`] on top of the batch-level errors.
pub fn compute_weighted_cvar_batch(
    tensor: &EnsembleTensor,
    alpha_levels: &[f64],
) -> Result<CvarBatch> {
    let sum = tensor.weight_sum();
    if (sum - 1.0).abs() >= WEIGHT_SUM_TOLERANCE {
        return Err(EnsembleError::InvalidWeights {
            sum,
            tolerance: WEIGHT_SUM_TOLERANCE,
        });
    }
    compute_cvar_batch(tensor, alpha_levels)
}

fn validate_tail_level(alpha: f64) -> Result<()> {
    // The negated form also rejects NaN.
    if !(alpha > 0.0 && alpha < 100.0) {
        return Err(EnsembleError::InvalidTailLevel { alpha });
    }
    Ok(())
}

fn ensure_nonempty(tensor: &EnsembleTensor) -> Result<()> {
    if tensor.n_runs() == 0 {
        return Err(EnsembleError::ShapeMismatch {
            what: "values",
            expected: "at least one run".to_string(),
            got: "0 runs".to_string(),
        });
    }
    Ok(())
}

/// Compute one CVaR plane per tail level, sorting each cell exactly once.
fn cvar_planes(tensor: &EnsembleTensor, alpha_levels: &[f64]) -> Vec<Array2<f64>> {
    let (n_runs, b, t) = (tensor.n_runs(), tensor.n_units(), tensor.n_steps());
    let values = tensor.values();
    let weights = tensor.weights();

    let mut planes: Vec<Array2<f64>> = alpha_levels.iter().map(|_| Array2::zeros((b, t))).collect();

    // Scratch buffers reused across all cells.
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n_runs);
    let mut cumulative: Vec<f64> = Vec::with_capacity(n_runs);

    for unit in 0..b {
        for step in 0..t {
            pairs.clear();
            for r in 0..n_runs {
                pairs.push((values[[r, unit, step]], weights[r]));
            }
            pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            cumulative.clear();
            let mut running = 0.0;
            for &(_, w) in pairs.iter() {
                running += w;
                cumulative.push(running);
            }

            for (plane, &alpha) in planes.iter_mut().zip(alpha_levels.iter()) {
                plane[[unit, step]] = cvar_from_sorted(&pairs, &cumulative, alpha / 100.0);
            }
        }
    }

    planes
}

/// CVaR of one cell from its sorted (value, weight) pairs and cumulative
/// weight sums.
///
/// `cutoff` is the index of the first run whose cumulative weight exceeds
/// the target mass, so `[0, cutoff)` is the tail whose cumulative weight
/// lies at or below it. A `cutoff` of zero means even the single smallest
/// run already crosses the threshold; a tail of size zero is not permitted,
/// so the minimum value is returned. A tail whose total weight is exactly
/// zero (floating-point cancellation, all-zero tail weights) also falls
/// back to the minimum value.
fn cvar_from_sorted(pairs: &[(f64, f64)], cumulative: &[f64], target_mass: f64) -> f64 {
    let cutoff = cumulative.partition_point(|&c| c <= target_mass);
    if cutoff == 0 {
        return pairs[0].0;
    }

    let tail_weight: f64 = pairs[..cutoff].iter().map(|&(_, w)| w).sum();
    if tail_weight == 0.0 {
        return pairs[0].0;
    }

    let weighted_sum: f64 = pairs[..cutoff].iter().map(|&(v, w)| v * w).sum();
    weighted_sum / tail_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{uniform_weights, EnsembleTensor};
    use ndarray::{array, Array3};

    fn tensor_from_runs(per_run: &[f64]) -> EnsembleTensor {
        let n = per_run.len();
        let values = Array3::from_shape_fn((n, 1, 1), |(r, _, _)| per_run[r]);
        EnsembleTensor::with_uniform_weights(values, (0..n as u64).collect()).unwrap()
    }

    #[test]
    fn rejects_out_of_range_tail_levels() {
        let tensor = tensor_from_runs(&[1.0, 2.0]);
        for alpha in [0.0, -5.0, 100.0, 150.0, f64::NAN] {
            let err = compute_cvar(&tensor, alpha).unwrap_err();
            assert!(matches!(err, EnsembleError::InvalidTailLevel { .. }));
        }
    }

    #[test]
    fn rejects_empty_run_axis() {
        let values: Array3<f64> = Array3::zeros((0, 2, 2));
        let tensor = EnsembleTensor::with_uniform_weights(values, vec![]).unwrap();
        let err = compute_cvar(&tensor, 10.0).unwrap_err();
        assert!(matches!(err, EnsembleError::ShapeMismatch { .. }));
    }

    #[test]
    fn two_run_half_weight_scenario() {
        // Weights [0.5, 0.5], values 100 and 200: the lower-50% tail is
        // exactly the single run valued 100.
        let values: Array3<f64> = array![[[100.0]], [[200.0]]];
        let tensor =
            EnsembleTensor::new(values, vec![0, 1], array![0.5, 0.5]).unwrap();

        let cvar50 = compute_cvar(&tensor, 50.0).unwrap();
        assert!((cvar50[[0, 0]] - 100.0).abs() < 1e-12);

        let exp = tensor.expectation();
        assert!((exp[[0, 0]] - 150.0).abs() < 1e-12);
    }

    #[test]
    fn single_run_cvar_equals_the_value_at_every_level() {
        let tensor = tensor_from_runs(&[42.0]);
        for alpha in [1.0, 10.0, 50.0, 99.0] {
            let cvar = compute_cvar(&tensor, alpha).unwrap();
            assert!((cvar[[0, 0]] - 42.0).abs() < 1e-12);
        }
    }

    #[test]
    fn tiny_tail_level_degenerates_to_minimum() {
        let tensor = tensor_from_runs(&[5.0, 1.0, 3.0]);
        // Each run carries 1/3; a 1% tail is below even one run's weight.
        let cvar = compute_cvar(&tensor, 1.0).unwrap();
        assert!((cvar[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_tail_falls_back_to_minimum() {
        let values: Array3<f64> = array![[[1.0]], [[2.0]], [[3.0]]];
        let tensor =
            EnsembleTensor::new(values, vec![0, 1, 2], array![0.0, 0.0, 1.0]).unwrap();
        // Cumulative weights are [0, 0, 1]; a 50% tail selects the two
        // zero-weight runs, whose total weight is exactly zero.
        let cvar = compute_cvar(&tensor, 50.0).unwrap();
        assert!((cvar[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tail_membership_differs_per_cell() {
        // Run 0 is worst in cell (0,0) but best in cell (0,1); the tail
        // must be selected independently per cell.
        let values: Array3<f64> = array![[[1.0, 9.0]], [[8.0, 2.0]], [[5.0, 5.0]]];
        let tensor = EnsembleTensor::with_uniform_weights(values, vec![0, 1, 2]).unwrap();
        let cvar = compute_cvar(&tensor, 40.0).unwrap();
        assert!((cvar[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((cvar[[0, 1]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn batch_matches_single_level_results() {
        let values = Array3::from_shape_fn((5, 2, 3), |(r, u, s)| {
            ((r * 7 + u * 3 + s * 11) % 13) as f64
        });
        let tensor =
            EnsembleTensor::new(values, (0..5).collect(), uniform_weights(5)).unwrap();

        let levels = [10.0, 25.0, 50.0, 90.0];
        let batch = compute_cvar_batch(&tensor, &levels).unwrap();
        for &alpha in &levels {
            let single = compute_cvar(&tensor, alpha).unwrap();
            let from_batch = batch.cvar(alpha).unwrap();
            assert_eq!(single, *from_batch);
        }
        assert_eq!(*batch.expectation(), tensor.expectation());
    }

    #[test]
    fn strict_entry_point_rejects_unnormalized_weights() {
        let values: Array3<f64> = array![[[1.0]], [[2.0]]];
        let tensor = EnsembleTensor::new(values, vec![0, 1], array![0.4, 0.4]).unwrap();
        let err = compute_weighted_cvar_batch(&tensor, &[50.0]).unwrap_err();
        assert!(matches!(err, EnsembleError::InvalidWeights { .. }));
    }

    #[test]
    fn strict_entry_point_accepts_normalized_weights() {
        let values: Array3<f64> = array![[[1.0]], [[2.0]]];
        let tensor = EnsembleTensor::new(values, vec![0, 1], array![0.3, 0.7]).unwrap();
        assert!(compute_weighted_cvar_batch(&tensor, &[50.0]).is_ok());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(tail_label(10.0), "cvar_10");
        assert_eq!(tail_label(2.5), "cvar_2.5");

        let tensor = tensor_from_runs(&[1.0, 2.0]);
        let batch = compute_cvar_batch(&tensor, &[10.0, 50.0]).unwrap();
        let labels: Vec<String> = batch.labeled().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["expectation", "cvar_10", "cvar_50"]);
    }
}
