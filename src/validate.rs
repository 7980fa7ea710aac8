//! Post-hoc ordering checks on CVaR outputs.
//!
//! For a correct CVaR definition under the "worst = lowest value"
//! convention, tail levels must order the results: α₁ < α₂ implies
//! cvar_α₁ ≤ cvar_α₂ ≤ expectation, cell by cell. This module counts
//! violations of that contract and reports them as structured data.
//! It is diagnostic only: it never mutates results and never raises;
//! a non-zero count is surfaced for the caller to log or alert on.

use crate::statistics::CvarBatch;

/// Cells violating the ordering between one adjacent pair of tail levels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairwiseViolation {
    /// Lower tail level of the pair.
    pub alpha_low: f64,
    /// Higher tail level of the pair.
    pub alpha_high: f64,
    /// Number of cells where `cvar(alpha_low) > cvar(alpha_high)`.
    pub cells: usize,
}

/// Structured result of a monotonicity check.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonotonicityReport {
    /// One entry per adjacent pair of sorted tail levels.
    pub pairwise: Vec<PairwiseViolation>,
    /// Cells where the highest-level CVaR exceeds the expectation.
    pub expectation_violations: usize,
    /// Sum of all pairwise and expectation violation counts.
    pub total_violations: usize,
}

impl MonotonicityReport {
    /// True when no cell violates the ordering contract.
    pub fn is_valid(&self) -> bool {
        self.total_violations == 0
    }
}

/// Check CVaR ordering across tail levels and against the expectation.
///
/// Tail levels are compared in ascending order regardless of the order
/// they were requested in. With fewer than two levels there are no
/// pairwise checks; the expectation bound is still checked against the
/// highest available level.
pub fn validate_monotonicity(batch: &CvarBatch) -> MonotonicityReport {
    let mut ordered: Vec<(f64, &ndarray::Array2<f64>)> = batch.iter().collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut pairwise = Vec::new();
    let mut total = 0usize;

    for pair in ordered.windows(2) {
        let (alpha_low, low) = pair[0];
        let (alpha_high, high) = pair[1];
        let cells = low
            .iter()
            .zip(high.iter())
            .filter(|(lo, hi)| lo > hi)
            .count();
        total += cells;
        pairwise.push(PairwiseViolation {
            alpha_low,
            alpha_high,
            cells,
        });
    }

    let expectation_violations = match ordered.last() {
        Some((_, highest)) => highest
            .iter()
            .zip(batch.expectation().iter())
            .filter(|(cvar, exp)| cvar > exp)
            .count(),
        None => 0,
    };
    total += expectation_violations;

    MonotonicityReport {
        pairwise,
        expectation_violations,
        total_violations: total,
    }
}
