//! In-memory ensemble data model.
//!
//! An [`EnsembleTensor`] holds one value per (run, spatial-unit, time-step)
//! plus the run identifiers and importance weights aligned with axis 0.
//! Spatial and temporal metadata are opaque to this crate: axes 1 and 2 are
//! purely positional, and results come back addressed the same way.

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};

use crate::error::{EnsembleError, Result};
use crate::statistics;

/// A 3-D ensemble of values indexed by (run, spatial-unit, time-step).
///
/// Axis-0 order is the caller's contract: `values` row `r` belongs to
/// `run_ids[r]` and carries `weights[r]`. No internal re-indexing occurs.
/// The tensor is immutable for the duration of a statistics computation.
#[derive(Debug, Clone)]
pub struct EnsembleTensor {
    values: Array3<f64>,
    run_ids: Vec<u64>,
    weights: Array1<f64>,
}

impl EnsembleTensor {
    /// Build a tensor with explicit importance weights.
    ///
    /// The weights are used as given; normalization is the provider's
    /// responsibility and is only enforced by the strict composite entry
    /// point ([`statistics::compute_weighted_cvar_batch`]).
    ///
    /// # Errors
    ///
    /// [`EnsembleError::ShapeMismatch`] if `run_ids` or `weights` do not
    /// match the run axis of `values`.
    pub fn new(values: Array3<f64>, run_ids: Vec<u64>, weights: Array1<f64>) -> Result<Self> {
        let n_runs = values.len_of(Axis(0));
        if run_ids.len() != n_runs {
            return Err(EnsembleError::ShapeMismatch {
                what: "run_ids",
                expected: n_runs.to_string(),
                got: run_ids.len().to_string(),
            });
        }
        if weights.len() != n_runs {
            return Err(EnsembleError::ShapeMismatch {
                what: "weights",
                expected: n_runs.to_string(),
                got: weights.len().to_string(),
            });
        }
        Ok(Self {
            values,
            run_ids,
            weights,
        })
    }

    /// Build a tensor with uniform weights `1/R`, the default when no
    /// importance weighting is supplied.
    ///
    /// # Errors
    ///
    /// [`EnsembleError::ShapeMismatch`] if `run_ids` does not match the run
    /// axis of `values`.
    pub fn with_uniform_weights(values: Array3<f64>, run_ids: Vec<u64>) -> Result<Self> {
        let n_runs = values.len_of(Axis(0));
        let weights = uniform_weights(n_runs);
        Self::new(values, run_ids, weights)
    }

    /// Number of runs (extent of axis 0).
    pub fn n_runs(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    /// Number of spatial units (extent of axis 1).
    pub fn n_units(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    /// Number of time steps (extent of axis 2).
    pub fn n_steps(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    /// The full (R, B, T) value array.
    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    /// Run identifiers aligned with axis 0.
    pub fn run_ids(&self) -> &[u64] {
        &self.run_ids
    }

    /// Importance weights aligned with axis 0.
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// The (B, T) slice for run index `r` (positional, not a run id).
    pub fn run_slice(&self, r: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), r)
    }

    /// Sum of the importance weights.
    pub fn weight_sum(&self) -> f64 {
        self.weights.sum()
    }

    /// Importance-weighted expectation per (spatial-unit, time-step) cell.
    ///
    /// Convenience forwarding to [`statistics::compute_expectation`].
    pub fn expectation(&self) -> Array2<f64> {
        statistics::compute_expectation(self)
    }
}

/// Uniform weight vector `1/R` of length `n_runs`.
pub fn uniform_weights(n_runs: usize) -> Array1<f64> {
    if n_runs == 0 {
        return Array1::zeros(0);
    }
    Array1::from_elem(n_runs, 1.0 / n_runs as f64)
}
