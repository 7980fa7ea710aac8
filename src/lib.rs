//! # tailwater
//!
//! Weighted ensemble tail-risk statistics for hydroclimate ensembles.
//!
//! Given many alternative trajectories ("runs") of a climate/hydrology
//! driver, this crate computes importance-weighted expectations and
//! Conditional-Value-at-Risk (CVaR) tail statistics per
//! (spatial-unit, time-step) cell, and can expand each run into synthetic
//! pseudo-runs that represent emulator uncertainty on top of scenario
//! uncertainty while preserving total probability mass.
//!
//! The crate is a pure, in-memory engine: no network, file, CLI, or cache
//! surface. Callers hand it materialized arrays (with spatial and temporal
//! metadata kept on their side; axes here are purely positional) and get
//! pure results back.
//!
//! ## Quick start
//!
//! ```ignore
//! use ndarray::Array3;
//! use tailwater::{compute_weighted_cvar_batch, validate_monotonicity, EnsembleTensor};
//!
//! // 30 runs over 12 basins and 80 years, uniform weights.
//! let values: Array3<f64> = load_emulator_output();
//! let tensor = EnsembleTensor::with_uniform_weights(values, (0..30).collect())?;
//!
//! let batch = compute_weighted_cvar_batch(&tensor, &[10.0, 50.0])?;
//! let report = validate_monotonicity(&batch);
//! assert!(report.is_valid());
//! ```
//!
//! ## Error policy
//!
//! Hard structural contract violations (shape mismatches, out-of-range
//! tail levels, unnormalized weights at the strict entry point) raise
//! [`EnsembleError`] and should be treated as pipeline-fatal for the
//! scenario at hand. Soft statistical anomalies in the data (negative
//! expectations, mis-ordered percentile triplets) are `tracing` warnings
//! with counts and extrema; the engine computes a well-defined answer and
//! leaves aggregation and review to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
mod error;
mod expand;
mod fit;
pub mod statistics;
mod tensor;
mod validate;

pub use error::{EnsembleError, Result};
pub use expand::{expand, ExpandedEnsemble};
pub use fit::{fit, Family, FittedDistribution};
pub use statistics::{
    compute_cvar, compute_cvar_batch, compute_expectation, compute_weighted_cvar_batch,
    tail_label, weighted_mean, CvarBatch,
};
pub use tensor::{uniform_weights, EnsembleTensor};
pub use validate::{validate_monotonicity, MonotonicityReport, PairwiseViolation};
