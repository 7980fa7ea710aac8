//! Vectorized three-quantile distribution fitting.
//!
//! Fits one parametric distribution per (spatial-unit, time-step) cell to a
//! percentile triplet, such that the fitted inverse CDF reproduces the
//! triplet at the probabilities in [`crate::constants`]: the supplied
//! "p10"/"p90" values are pinned at the 5th/95th percentile of the fit
//! ([`FIT_PROB_LOW`]/[`FIT_PROB_HIGH`]), widening the tails relative to the
//! literal labels. That asymmetry is preserved verbatim from the upstream
//! behavior and is concentrated in those two named constants.
//!
//! Each cell is fitted independently; there is never one global fit. This
//! matters downstream: CVaR correctness depends on independent randomness
//! per cell, which in turn requires an independent inverse CDF per cell.

use ndarray::{Array2, ArrayView2, Zip};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::constants::{SYMMETRY_EPSILON, Z_FIT_HIGH};
use crate::error::{EnsembleError, Result};

/// Distribution family for percentile-triplet fitting.
///
/// Chosen explicitly by the caller (typically lognormal for skewed
/// hydrological quantities, normal when the triplet is approximately
/// symmetric). There is no runtime auto-detection at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Family {
    /// Three-parameter lognormal: `ppf(q) = loc + scale·exp(shape·Φ⁻¹(q))`.
    Lognormal,
    /// Normal with mean `p50` and scale implied by the p10/p90 spread.
    Normal,
}

/// Per-cell fitted distributions over a (B, T) plane.
///
/// Stores (shape, loc, scale) parameter planes. Cells with `shape == 0`
/// are the normal limit (`ppf(q) = loc + scale·Φ⁻¹(q)`), which also covers
/// zero-spread triplets as a point mass (`scale == 0`). Transient: created
/// and consumed within a single expansion call, never persisted.
#[derive(Debug, Clone)]
pub struct FittedDistribution {
    shape: Array2<f64>,
    loc: Array2<f64>,
    scale: Array2<f64>,
}

/// Fit one distribution per cell to a (p10, p50, p90) triplet.
///
/// The closed-form lognormal fit uses the skew ratio
/// `r = (p90−p50)/(p50−p10)`:
///
/// ```text
/// shape = ln(r) / Φ⁻¹(0.95)
/// scale = (p90 − p50) / (r − 1)
/// loc   = p50 − scale
/// ```
///
/// which pins all three quantiles exactly for right-skew (`r > 1`) and
/// left-skew (`r < 1`) alike. For left-skewed cells the fitted support
/// extends below zero, so samples drawn far into the lower tail can be
/// physically negative even though the triplet is non-negative; the
/// expansion step clips such draws to zero (documented lossy behavior).
///
/// Per-cell numerical fallbacks (not a family switch): a non-finite or
/// non-positive skew ratio, or one within [`SYMMETRY_EPSILON`] of 1, is
/// fitted as a normal; a zero-spread triplet becomes a point mass at p50.
/// Mis-ordered triplets are not rejected here; the fit is best-effort and
/// upstream validation is the caller's responsibility.
///
/// # Errors
///
/// [`EnsembleError::ShapeMismatch`] if the three planes disagree in shape.
pub fn fit(
    p10: ArrayView2<'_, f64>,
    p50: ArrayView2<'_, f64>,
    p90: ArrayView2<'_, f64>,
    family: Family,
) -> Result<FittedDistribution> {
    check_plane_shape("p50", p10.dim(), p50.dim())?;
    check_plane_shape("p90", p10.dim(), p90.dim())?;

    let dim = p10.raw_dim();
    let mut shape = Array2::<f64>::zeros(dim);
    let mut loc = Array2::<f64>::zeros(dim);
    let mut scale = Array2::<f64>::zeros(dim);

    Zip::from(&mut shape)
        .and(&mut loc)
        .and(&mut scale)
        .and(&p10)
        .and(&p50)
        .and(&p90)
        .for_each(|sh, lo, sc, &q10, &q50, &q90| {
            let (s, l, c) = fit_cell(q10, q50, q90, family);
            *sh = s;
            *lo = l;
            *sc = c;
        });

    Ok(FittedDistribution { shape, loc, scale })
}

impl FittedDistribution {
    /// Invert the per-cell fitted CDFs at a (B, T) array of probabilities.
    ///
    /// One probability per cell, one value per cell. This is the seam that
    /// supports independent-per-cell random quantile sampling; there is
    /// deliberately no scalar variant that shares one quantile across all
    /// cells of a trajectory.
    ///
    /// Values are returned unclipped: left-skewed cells can produce
    /// negative (even `-inf` at `q = 0`) results, which the expansion step
    /// clips to zero.
    ///
    /// # Errors
    ///
    /// [`EnsembleError::ShapeMismatch`] if `quantiles` does not match the
    /// fitted plane shape.
    pub fn ppf(&self, quantiles: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_plane_shape("quantiles", self.shape.dim(), quantiles.dim())?;

        let standard = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
        let mut out = Array2::<f64>::zeros(self.shape.raw_dim());
        Zip::from(&mut out)
            .and(&self.shape)
            .and(&self.loc)
            .and(&self.scale)
            .and(&quantiles)
            .for_each(|v, &sh, &lo, &sc, &q| {
                let z = standard.inverse_cdf(q);
                *v = if sh != 0.0 {
                    lo + sc * (sh * z).exp()
                } else {
                    lo + sc * z
                };
            });
        Ok(out)
    }

    /// Shape of the fitted (B, T) plane.
    pub fn dim(&self) -> (usize, usize) {
        self.shape.dim()
    }
}

/// Closed-form fit of a single cell. Returns (shape, loc, scale).
fn fit_cell(p10: f64, p50: f64, p90: f64, family: Family) -> (f64, f64, f64) {
    match family {
        Family::Normal => normal_cell(p10, p50, p90),
        Family::Lognormal => {
            let lower = p50 - p10;
            let upper = p90 - p50;
            if lower <= 0.0 || upper <= 0.0 {
                // Degenerate or mis-ordered triplet: best-effort normal
                // (a fully collapsed triplet becomes a point mass).
                return normal_cell(p10, p50, p90);
            }
            let ratio = upper / lower;
            if !ratio.is_finite() || (ratio - 1.0).abs() < SYMMETRY_EPSILON {
                return normal_cell(p10, p50, p90);
            }
            let shape = ratio.ln() / Z_FIT_HIGH;
            let scale = upper / (ratio - 1.0);
            (shape, p50 - scale, scale)
        }
    }
}

/// Normal fit of a single cell: mean p50, scale from the p10/p90 spread.
fn normal_cell(p10: f64, p50: f64, p90: f64) -> (f64, f64, f64) {
    let spread = p90 - p10;
    let scale = if spread > 0.0 {
        spread / (2.0 * Z_FIT_HIGH)
    } else {
        0.0
    };
    (0.0, p50, scale)
}

fn check_plane_shape(
    what: &'static str,
    expected: (usize, usize),
    got: (usize, usize),
) -> Result<()> {
    if expected != got {
        return Err(EnsembleError::ShapeMismatch {
            what,
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        });
    }
    Ok(())
}
