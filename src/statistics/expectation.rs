//! Importance-weighted expectation over the run axis.

use ndarray::{Array2, ArrayView1, ArrayView3, Axis};
use tracing::warn;

use crate::error::{EnsembleError, Result};
use crate::tensor::EnsembleTensor;

/// Importance-weighted expectation per (spatial-unit, time-step) cell.
///
/// Computes `Σ_r w[r] · values[r,b,t]` with the tensor's own weights
/// (uniform `1/R` when the tensor was built without explicit weights).
/// The weights are used as given; no re-normalization occurs.
///
/// Negative output cells are not an error in this engine, but in the
/// intended physical domain (non-negative quantities) they signal an
/// upstream data problem, so a single warning with the cell count and the
/// minimum value is emitted before returning.
pub fn compute_expectation(tensor: &EnsembleTensor) -> Array2<f64> {
    // Tensor construction already guarantees the weight length.
    let out = weighted_mean(tensor.values().view(), tensor.weights().view())
        .expect("tensor weights are validated at construction");
    warn_on_negative_cells(&out, "expectation");
    out
}

/// Weighted sum over axis 0 of a raw (R, B, T) array.
///
/// Low-level primitive behind [`compute_expectation`], usable with
/// unnormalized weights for intermediate calculations.
///
/// # Errors
///
/// [`EnsembleError::ShapeMismatch`] if `weights` does not match the run
/// axis of `values`.
pub fn weighted_mean(values: ArrayView3<'_, f64>, weights: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
    let n_runs = values.len_of(Axis(0));
    if weights.len() != n_runs {
        return Err(EnsembleError::ShapeMismatch {
            what: "weights",
            expected: n_runs.to_string(),
            got: weights.len().to_string(),
        });
    }

    let (b, t) = (values.len_of(Axis(1)), values.len_of(Axis(2)));
    let mut out = Array2::<f64>::zeros((b, t));
    for (slice, &w) in values.axis_iter(Axis(0)).zip(weights.iter()) {
        out.scaled_add(w, &slice);
    }
    Ok(out)
}

/// Emit one warning if any cell of a result plane is negative.
pub(crate) fn warn_on_negative_cells(plane: &Array2<f64>, statistic: &str) {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    for &v in plane.iter() {
        if v < 0.0 {
            count += 1;
            if v < min {
                min = v;
            }
        }
    }
    if count > 0 {
        warn!(
            statistic,
            negative_cells = count,
            min_value = min,
            "negative cells in a non-negative physical quantity; check upstream data"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::EnsembleTensor;
    use ndarray::{array, Array1, Array3};

    #[test]
    fn uniform_weights_reduce_to_arithmetic_mean() {
        let values: Array3<f64> = array![[[2.0, 4.0]], [[6.0, 8.0]]];
        let tensor = EnsembleTensor::with_uniform_weights(values, vec![0, 1]).unwrap();
        let exp = compute_expectation(&tensor);
        assert!((exp[[0, 0]] - 4.0).abs() < 1e-12);
        assert!((exp[[0, 1]] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn weights_are_used_as_given_without_renormalization() {
        let values: Array3<f64> = array![[[10.0]], [[20.0]]];
        // Deliberately unnormalized: sum is 3.0, result is a weighted sum.
        let weights = array![1.0, 2.0];
        let out = weighted_mean(values.view(), weights.view()).unwrap();
        assert!((out[[0, 0]] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn weight_length_mismatch_is_rejected() {
        let values: Array3<f64> = Array3::zeros((3, 1, 1));
        let weights: Array1<f64> = array![0.5, 0.5];
        let err = weighted_mean(values.view(), weights.view()).unwrap_err();
        assert!(matches!(
            err,
            crate::EnsembleError::ShapeMismatch { what: "weights", .. }
        ));
    }

    #[test]
    fn negative_cells_are_computed_through() {
        // Negative inputs are suspicious but must still produce a
        // well-defined answer.
        let values: Array3<f64> = array![[[-4.0]], [[2.0]]];
        let tensor = EnsembleTensor::with_uniform_weights(values, vec![0, 1]).unwrap();
        let exp = compute_expectation(&tensor);
        assert!((exp[[0, 0]] + 1.0).abs() < 1e-12);
    }
}
