//! Weighted ensemble statistics.
//!
//! Pure functions over an [`crate::EnsembleTensor`]:
//! - importance-weighted expectation per (spatial-unit, time-step) cell
//! - weighted Conditional-Value-at-Risk at arbitrary tail levels
//! - a batch API that sorts each cell once and reads off every tail level
//!
//! Every statistic is computed independently per cell; nothing here is a
//! whole-tensor summary.

mod cvar;
mod expectation;

pub use cvar::{
    compute_cvar, compute_cvar_batch, compute_weighted_cvar_batch, tail_label, CvarBatch,
};
pub use expectation::{compute_expectation, weighted_mean};
