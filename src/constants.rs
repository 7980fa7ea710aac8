//! Numeric constants used throughout the crate.

/// Default deterministic seed for uncertainty expansion.
///
/// Same seed + same inputs = same pseudo-runs, bit for bit.
/// The value `0x7461696C` is "tail" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x7461696C;

/// Probability at which the supplied "p10" percentile is pinned when
/// fitting a distribution to a percentile triplet.
///
/// The emulator labels its lower estimate "p10", but the fit deliberately
/// treats it as the 5th percentile, widening the fitted tails. This is
/// preserved verbatim from the upstream behavior; if the labeling is ever
/// clarified, this constant (and [`FIT_PROB_HIGH`]) is the one place to
/// change it.
pub const FIT_PROB_LOW: f64 = 0.05;

/// Probability at which the supplied median ("p50") is pinned. See
/// [`FIT_PROB_LOW`].
pub const FIT_PROB_MID: f64 = 0.50;

/// Probability at which the supplied "p90" percentile is pinned. See
/// [`FIT_PROB_LOW`].
pub const FIT_PROB_HIGH: f64 = 0.95;

/// Standard normal quantile at [`FIT_PROB_HIGH`], i.e. Φ⁻¹(0.95).
///
/// Used by the closed-form quantile fits; Φ⁻¹(0.05) is its negation.
pub const Z_FIT_HIGH: f64 = 1.6448536269514722;

/// Tolerance on `|sum(weights) - 1.0|` for normalized importance weights.
///
/// Only the strict composite entry point enforces this; the low-level
/// primitives accept unnormalized weights on purpose.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Skew ratios within this distance of 1.0 are treated as symmetric and
/// fitted with a normal rather than a lognormal, avoiding the blow-up of
/// the lognormal scale parameter as the ratio approaches 1.
pub const SYMMETRY_EPSILON: f64 = 1e-9;
