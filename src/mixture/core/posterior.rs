//! E-step: class-membership posteriors and the observed-data log-likelihood.
//!
//! Purpose
//! -------
//! Evaluate, for every observation `i` and class `k`,
//!
//! `ln π_k(z_i) + Σ_{j observed} ln f_kj(y_ij)`
//!
//! and normalize each row with log-sum-exp. The normalizers are the
//! per-observation log-likelihood contributions; their sum is the
//! observed-data log-likelihood under local independence. Missing
//! indicators are skipped (full-information ML under MAR).
//!
//! Key behaviors
//! -------------
//! - [`e_step`] fills a caller-owned `n × K` buffer in place and returns the
//!   log-likelihood; EM reuses one buffer across iterations.
//! - [`PosteriorMatrix`] is the validated, immutable posterior handed to
//!   callers, with modal assignment, class sums and relabelling helpers.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters satisfy the `MixtureParams` invariants. The entry points
//!   [`e_step`] and [`loglik_contributions`] reject parameters whose blocks
//!   do not match the data layout.
//! - Every row has at least one observed indicator (guaranteed by
//!   `MixtureData`), so each normalizer is finite unless parameters are
//!   broken, in which case `NonFiniteLogLik` is returned.
//!
//! Conventions
//! -----------
//! - Gaussian densities for continuous indicators; category probabilities
//!   for categorical indicators, evaluated as `ln max(p, PROB_FLOOR)`.
//! - Modal class ties resolve to the lowest class index.
use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayViewMut1, Axis};

use crate::{
    mixture::{
        core::{
            data::{Indicator, MixtureData},
            params::{IndicatorParams, MixtureParams},
            validation::validate_probability_rows,
        },
        errors::{MixtureError, MixtureResult},
    },
    optimization::numerical_stability::{PROB_FLOOR, softmax_in_place},
};

/// Gaussian log density `ln φ(y; μ, σ²)`.
pub fn gaussian_log_density(y: f64, mean: f64, variance: f64) -> f64 {
    -0.5 * ((2.0 * PI * variance).ln() + (y - mean).powi(2) / variance)
}

/// Add `Σ_j ln f_kj(y_ij)` over the observed indicators of row `i` to
/// `out[k]` for every class.
pub(crate) fn add_indicator_log_densities(
    params: &MixtureParams, data: &MixtureData, i: usize, mut out: ArrayViewMut1<'_, f64>,
) {
    for (block, ind) in params.indicators.iter().zip(&data.indicators) {
        match (block, ind) {
            (IndicatorParams::Continuous { means, variances }, Indicator::Continuous { values }) => {
                let y = values[i];
                if y.is_nan() {
                    continue;
                }
                for k in 0..out.len() {
                    out[k] += gaussian_log_density(y, means[k], variances[k]);
                }
            }
            (IndicatorParams::Categorical { probs }, Indicator::Categorical { codes, .. }) => {
                if let Some(c) = codes[i] {
                    for k in 0..out.len() {
                        out[k] += probs[[k, c]].max(PROB_FLOOR).ln();
                    }
                }
            }
            _ => {}
        }
    }
}

/// Compute posteriors into `out` (`n × K`) and return the log-likelihood.
///
/// # Errors
/// - `LayoutMismatch` when `out` has the wrong shape or the parameter
///   blocks do not match the data.
/// - `NonFiniteLogLik` when any observation's contribution is not finite.
pub fn e_step(
    params: &MixtureParams, data: &MixtureData, out: &mut Array2<f64>,
) -> MixtureResult<f64> {
    let n = data.n_obs();
    let k = params.n_classes();
    if out.dim() != (n, k) {
        return Err(MixtureError::LayoutMismatch { reason: "posterior buffer has the wrong shape" });
    }
    params.check_layout(data)?;
    let mut loglik = 0.0;
    for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        params.log_class_probs_into(data.design_row(i), row.view_mut());
        add_indicator_log_densities(params, data, i, row.view_mut());
        let contribution = softmax_in_place(row);
        if !contribution.is_finite() {
            return Err(MixtureError::NonFiniteLogLik { value: contribution });
        }
        loglik += contribution;
    }
    Ok(loglik)
}

/// Per-observation log-likelihood contributions `ℓ_i`.
///
/// # Errors
/// - `LayoutMismatch` when the parameter blocks do not match the data.
/// - `NonFiniteLogLik` when any contribution is not finite.
pub fn loglik_contributions(
    params: &MixtureParams, data: &MixtureData,
) -> MixtureResult<Array1<f64>> {
    params.check_layout(data)?;
    let k = params.n_classes();
    let mut buf = Array1::<f64>::zeros(k);
    let mut out = Array1::<f64>::zeros(data.n_obs());
    for i in 0..data.n_obs() {
        params.log_class_probs_into(data.design_row(i), buf.view_mut());
        add_indicator_log_densities(params, data, i, buf.view_mut());
        let contribution = softmax_in_place(buf.view_mut());
        if !contribution.is_finite() {
            return Err(MixtureError::NonFiniteLogLik { value: contribution });
        }
        out[i] = contribution;
    }
    Ok(out)
}

/// Observed-data log-likelihood at `params`.
pub fn loglik(params: &MixtureParams, data: &MixtureData) -> MixtureResult<f64> {
    Ok(loglik_contributions(params, data)?.sum())
}

/// Validated `n × K` matrix of posterior class-membership probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorMatrix {
    probs: Array2<f64>,
}

impl PosteriorMatrix {
    /// Wrap a matrix whose rows are probability vectors.
    ///
    /// # Errors
    /// - `LayoutMismatch` when any row is not a probability vector.
    pub fn new(probs: Array2<f64>) -> MixtureResult<Self> {
        validate_probability_rows(probs.view(), "posterior rows must be probability vectors")?;
        Ok(PosteriorMatrix { probs })
    }

    /// Run the E-step at `params` and return the posterior with the
    /// log-likelihood.
    pub fn compute(params: &MixtureParams, data: &MixtureData) -> MixtureResult<(Self, f64)> {
        let mut probs = Array2::<f64>::zeros((data.n_obs(), params.n_classes()));
        let ll = e_step(params, data, &mut probs)?;
        Ok((PosteriorMatrix { probs }, ll))
    }

    pub(crate) fn from_e_step(probs: Array2<f64>) -> Self {
        PosteriorMatrix { probs }
    }

    pub fn probs(&self) -> &Array2<f64> {
        &self.probs
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.probs
    }

    pub fn n_obs(&self) -> usize {
        self.probs.nrows()
    }

    pub fn n_classes(&self) -> usize {
        self.probs.ncols()
    }

    /// Most likely class per observation; ties go to the lowest index.
    pub fn modal_classes(&self) -> Vec<usize> {
        self.probs
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (k, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = k;
                    }
                }
                best
            })
            .collect()
    }

    /// Column sums `Σ_i p_ik` (posterior-based class counts).
    pub fn class_sums(&self) -> Array1<f64> {
        self.probs.sum_axis(Axis(0))
    }

    /// Reorder columns so new class `c` is current class `order[c]`.
    pub fn relabel(&self, order: &[usize]) -> PosteriorMatrix {
        PosteriorMatrix { probs: self.probs.select(Axis(1), order) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::core::data::IndicatorKind;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - E-step log-likelihood against a hand-computed mixture density.
    // - Missing indicators being skipped.
    // - Modal assignment tie-break and validation of posterior rows.
    // - Rejection of parameters that do not match the data layout.
    // -------------------------------------------------------------------------

    fn two_class_params() -> MixtureParams {
        MixtureParams::new(
            array![[0.0], [0.0]],
            vec![
                IndicatorParams::Continuous { means: array![0.0, 2.0], variances: array![1.0, 1.0] },
                IndicatorParams::Categorical { probs: array![[0.8, 0.2], [0.3, 0.7]] },
            ],
        )
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the E-step against a direct evaluation of the mixture density,
    // including a row with a missing continuous value.
    //
    // Given
    // -----
    // - Equal proportions, N(0,1)/N(2,1) and 2-level probabilities.
    // - Row 0: (1.0, level 0); row 1: (missing, level 1).
    //
    // Expect
    // ------
    // - The log-likelihood equals Σ_i ln Σ_k 0.5 f_k(y_i).
    // - Posterior rows sum to one; row 1 depends only on the categorical item.
    fn e_step_matches_direct_mixture_density() {
        // Arrange
        let x = array![[1.0, 0.0], [f64::NAN, 1.0], [2.5, 1.0]];
        let data = MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Categorical],
            None,
        )
        .unwrap();
        let params = two_class_params();
        let phi = |y: f64, m: f64| gaussian_log_density(y, m, 1.0).exp();

        // Act
        let (post, ll) = PosteriorMatrix::compute(&params, &data).unwrap();

        // Assert
        let l0 = 0.5 * phi(1.0, 0.0) * 0.8 + 0.5 * phi(1.0, 2.0) * 0.3;
        let l1: f64 = 0.5 * 0.2 + 0.5 * 0.7;
        let l2 = 0.5 * phi(2.5, 0.0) * 0.2 + 0.5 * phi(2.5, 2.0) * 0.7;
        assert_relative_eq!(ll, l0.ln() + l1.ln() + l2.ln(), epsilon = 1e-10);
        assert_relative_eq!(post.probs()[[1, 0]], 0.1 / 0.45, epsilon = 1e-10);
        for row in post.probs().rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(loglik(&params, &data).unwrap(), ll, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Ensure modal assignment breaks ties toward the lowest class index.
    //
    // Given
    // -----
    // - Rows [0.5, 0.5], [0.2, 0.8].
    //
    // Expect
    // ------
    // - Modal classes [0, 1]; class sums [0.7, 1.3].
    fn modal_classes_break_ties_low() {
        let post = PosteriorMatrix::new(array![[0.5, 0.5], [0.2, 0.8]]).unwrap();
        assert_eq!(post.modal_classes(), vec![0, 1]);
        assert_relative_eq!(post.class_sums()[1], 1.3, epsilon = 1e-12);
        assert_eq!(post.relabel(&[1, 0]).probs()[[1, 0]], 0.8);
        assert!(PosteriorMatrix::new(array![[0.5, 0.6]]).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Ensure the public E-step entry points refuse parameters whose blocks
    // disagree with the data instead of skipping the indicator.
    //
    // Given
    // -----
    // - Two-class parameters (continuous + categorical blocks) evaluated on
    //   data whose indicators are categorical + continuous.
    //
    // Expect
    // ------
    // - `LayoutMismatch` from `PosteriorMatrix::compute`, `loglik` and
    //   `loglik_contributions`.
    fn mismatched_layout_is_rejected() {
        // Arrange
        let x = array![[0.0, 1.0], [1.0, 2.5]];
        let data = MixtureData::new(
            x.view(),
            &[IndicatorKind::Categorical, IndicatorKind::Continuous],
            None,
        )
        .unwrap();
        let params = two_class_params();

        // Act
        let computed = PosteriorMatrix::compute(&params, &data);
        let total = loglik(&params, &data);
        let parts = loglik_contributions(&params, &data);

        // Assert
        assert!(matches!(computed, Err(MixtureError::LayoutMismatch { .. })));
        assert!(matches!(total, Err(MixtureError::LayoutMismatch { .. })));
        assert!(matches!(parts, Err(MixtureError::LayoutMismatch { .. })));
    }
}
