//! Uncertainty expansion: percentile triplets → synthetic pseudo-runs.
//!
//! Emulator uncertainty is aleatory: independent year-to-year noise in the
//! emulator's own prediction, not a persistent per-run bias. Every
//! (pseudo-sample, spatial-unit, time-step) triple therefore gets its own
//! random quantile — one draw is never reused across a whole trajectory —
//! so that downstream CVaR tails measure "risk in any given year" rather
//! than "one unlucky trajectory that is bad everywhere".

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::warn;

use crate::error::{EnsembleError, Result};
use crate::fit::{fit, Family};
use crate::tensor::EnsembleTensor;

/// Result of an uncertainty expansion: R·K pseudo-runs over (B, T).
///
/// Pseudo-run identifiers are fresh sequential ids `0..R·K` (input run ids
/// are never reused); pseudo-run `r·K + k` is the k-th sample drawn from
/// input run `r`, and carries weight `weights[r] / K`. Total weight mass
/// equals the input total.
#[derive(Debug, Clone)]
pub struct ExpandedEnsemble {
    values: Array3<f64>,
    run_ids: Vec<u64>,
    weights: Array1<f64>,
}

impl ExpandedEnsemble {
    /// The full (R·K, B, T) pseudo-run value array.
    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    /// Sequential pseudo-run identifiers, `0..R·K`.
    pub fn run_ids(&self) -> &[u64] {
        &self.run_ids
    }

    /// Redistributed weights, aligned with the pseudo-run axis.
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Number of pseudo-runs.
    pub fn n_pseudo_runs(&self) -> usize {
        self.run_ids.len()
    }

    /// The (B, T) plane of one pseudo-run by its sequential id.
    pub fn pseudo_run(&self, id: u64) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), id as usize)
    }

    /// Convert into an [`EnsembleTensor`] for the statistics functions.
    pub fn into_tensor(self) -> EnsembleTensor {
        EnsembleTensor::new(self.values, self.run_ids, self.weights)
            .expect("expanded axes are constructed aligned")
    }
}

/// Expand each run's percentile triplet into `n_samples` pseudo-runs.
///
/// `p10`, `p50`, `p90` are (R, B, T) arrays giving the per-run, per-cell
/// percentile estimates from the emulator. Per input run (axis-0 order):
///
/// 1. fit one distribution per cell ([`fit`], with the chosen `family`);
/// 2. for each of the `n_samples` pseudo-runs, draw an independent
///    uniform(0,1) per cell and invert the fitted CDF there;
/// 3. clip negative draws to zero (left-skewed lognormal cells can sample
///    below zero far into the lower tail);
/// 4. assign weight `weights[r] / n_samples` to every child.
///
/// Determinism: a single [`Xoshiro256PlusPlus`] is seeded once from `seed`
/// and consumed in a fixed order (run-major, sample-minor, row-major
/// within a plane), so identical inputs and seed give bit-identical
/// output.
///
/// Triplets violating `p10 ≤ p50 ≤ p90` are not rejected: the offending
/// cells are counted, one warning is emitted, and the fit proceeds
/// best-effort. Upstream validation is the producer's responsibility.
///
/// # Errors
///
/// [`EnsembleError::ShapeMismatch`] if the triplet arrays disagree in
/// shape, if `run_ids` or `weights` do not match the run axis, or if
/// `n_samples` is zero.
#[allow(clippy::too_many_arguments)]
pub fn expand(
    p10: &Array3<f64>,
    p50: &Array3<f64>,
    p90: &Array3<f64>,
    run_ids: &[u64],
    weights: &Array1<f64>,
    n_samples: usize,
    family: Family,
    seed: u64,
) -> Result<ExpandedEnsemble> {
    check_triplet_shape("p50", p10, p50)?;
    check_triplet_shape("p90", p10, p90)?;

    let (n_runs, b, t) = p10.dim();
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
    if n_samples == 0 {
        return Err(EnsembleError::ShapeMismatch {
            what: "n_samples",
            expected: "at least 1".to_string(),
            got: "0".to_string(),
        });
    }

    warn_on_misordered_triplets(p10, p50, p90);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut values = Array3::<f64>::zeros((n_runs * n_samples, b, t));
    let mut out_weights = Array1::<f64>::zeros(n_runs * n_samples);

    for r in 0..n_runs {
        let fitted = fit(
            p10.index_axis(Axis(0), r),
            p50.index_axis(Axis(0), r),
            p90.index_axis(Axis(0), r),
            family,
        )?;
        let child_weight = weights[r] / n_samples as f64;

        for k in 0..n_samples {
            // One independent uniform per cell, drawn in row-major order.
            let quantiles = Array2::from_shape_simple_fn((b, t), || rng.random::<f64>());
            let sampled = fitted.ppf(quantiles.view())?;

            let idx = r * n_samples + k;
            values
                .index_axis_mut(Axis(0), idx)
                .assign(&sampled.mapv(|v| v.max(0.0)));
            out_weights[idx] = child_weight;
        }
    }

    let run_ids = (0..(n_runs * n_samples) as u64).collect();
    Ok(ExpandedEnsemble {
        values,
        run_ids,
        weights: out_weights,
    })
}

fn check_triplet_shape(what: &'static str, p10: &Array3<f64>, other: &Array3<f64>) -> Result<()> {
    if p10.dim() != other.dim() {
        return Err(EnsembleError::ShapeMismatch {
            what,
            expected: format!("{:?}", p10.dim()),
            got: format!("{:?}", other.dim()),
        });
    }
    Ok(())
}

/// Count cells violating p10 ≤ p50 ≤ p90 and emit one warning if any.
fn warn_on_misordered_triplets(p10: &Array3<f64>, p50: &Array3<f64>, p90: &Array3<f64>) {
    let mut count = 0usize;
    let mut worst_gap = 0.0f64;
    for ((&lo, &mid), &hi) in p10.iter().zip(p50.iter()).zip(p90.iter()) {
        if !(lo <= mid && mid <= hi) {
            count += 1;
            worst_gap = worst_gap.max((lo - mid).max(mid - hi));
        }
    }
    if count > 0 {
        warn!(
            misordered_cells = count,
            total_cells = p10.len(),
            worst_gap,
            "percentile triplets violate p10 <= p50 <= p90; fitting best-effort"
        );
    }
}
