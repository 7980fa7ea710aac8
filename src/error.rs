//! Error types for ensemble statistics.
//!
//! Hard structural contract violations (shapes, weight sums, tail levels)
//! are errors and fail fast. Soft statistical anomalies in the data
//! (negative expectations, mis-ordered percentile triplets) are *not*
//! errors: they are surfaced as `tracing` warnings with counts and extrema,
//! and the computation proceeds, so a batch pipeline is never halted by
//! suspicious-but-well-defined inputs.

use std::fmt;

/// Errors raised by the ensemble statistics engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// An array axis or companion vector does not have the expected length
    /// or shape. Always raised, never recovered.
    ShapeMismatch {
        /// Which input disagreed (e.g. `"weights"`, `"run_ids"`, `"p50"`).
        what: &'static str,
        /// The expected extent or shape.
        expected: String,
        /// The extent or shape actually supplied.
        got: String,
    },

    /// Importance weights do not sum to ≈1.0.
    ///
    /// Only checked by the strict composite entry point
    /// (`compute_weighted_cvar_batch`); the low-level primitives accept
    /// unnormalized weights for intermediate calculations.
    InvalidWeights {
        /// The actual weight sum.
        sum: f64,
        /// The tolerance that was violated.
        tolerance: f64,
    },

    /// Tail level outside the open interval (0, 100).
    ///
    /// Out-of-range levels are a contract violation and are never clamped.
    InvalidTailLevel {
        /// The offending tail level.
        alpha: f64,
    },
}

impl fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleError::ShapeMismatch {
                what,
                expected,
                got,
            } => {
                write!(f, "shape mismatch for {what}: expected {expected}, got {got}")
            }
            EnsembleError::InvalidWeights { sum, tolerance } => {
                write!(
                    f,
                    "weights must sum to 1.0 within {tolerance:e}, got sum {sum}"
                )
            }
            EnsembleError::InvalidTailLevel { alpha } => {
                write!(f, "tail level must be in (0, 100), got {alpha}")
            }
        }
    }
}

impl std::error::Error for EnsembleError {}

/// Result type for ensemble statistics operations.
pub type Result<T> = std::result::Result<T, EnsembleError>;
