//! inference::hessian — covariance matrices from observed information.
//!
//! Purpose
//! -------
//! Turn an observed information matrix `J` (average log-likelihood scale)
//! into parameter covariances for mixture models, which are routinely
//! near-singular: classes that are almost empty or indicators that barely
//! separate classes leave flat directions in `J`.
//!
//! Key behaviors
//! -------------
//! - [`covariance_from_information`] returns the pseudoinverse `J⁺`, or the
//!   sandwich `J⁺ S J⁺` when an outer-product meat `S` is supplied.
//! - [`condition_number`] reports `λ_min / λ_max` of `J` so callers can
//!   flag empirically under-identified solutions.
//!
//! Invariants & assumptions
//! ------------------------
//! - `J` is symmetric (the finite-difference Hessian is symmetrized
//!   upstream) and `S`, when given, has the same dimension.
//! - Eigen-directions with `λ ≤ EIGEN_EPS` are dropped, so they receive zero
//!   rather than infinite variance.
//!
//! Conventions
//! -----------
//! - Inputs and outputs are on the average scale; `MixtureModel` divides by
//!   `n` to obtain `Var(θ̂)`.
//! - No explicit inverse is formed; everything goes through
//!   `nalgebra::SymmetricEigen`.
use nalgebra::DMatrix;
use ndarray::Array2;

use crate::optimization::numerical_stability::transformations::EIGEN_EPS;

/// Which covariance estimator to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarianceEstimator {
    /// Inverse observed information, `J⁺`.
    Ml,
    /// Sandwich `J⁺ S J⁺` with the OPG meat `S`; robust to misspecified
    /// class-conditional distributions.
    #[default]
    Mlr,
}

/// `J⁺`, or `J⁺ S J⁺` when `meat` is given.
pub fn covariance_from_information(info: &Array2<f64>, meat: Option<&Array2<f64>>) -> Array2<f64> {
    let j_pinv = pseudo_inverse(info);
    match meat {
        Some(s) => j_pinv.dot(s).dot(&j_pinv),
        None => j_pinv,
    }
}

/// Ratio of smallest to largest eigenvalue of a symmetric information
/// matrix; 0 when the largest is not positive.
pub fn condition_number(info: &Array2<f64>) -> f64 {
    let eig = to_dmatrix(info).symmetric_eigen().eigenvalues;
    let max = eig.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = eig.iter().copied().fold(f64::INFINITY, f64::min);
    if max > 0.0 { (min / max).max(0.0) } else { 0.0 }
}

fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

/// `Σ_{k: λ_k > EIGEN_EPS} q_k q_kᵀ / λ_k` for `J = Q Λ Qᵀ`.
fn pseudo_inverse(info: &Array2<f64>) -> Array2<f64> {
    let n = info.nrows();
    let eigen = to_dmatrix(info).symmetric_eigen();
    let q = eigen.eigenvectors;
    let mut out = Array2::<f64>::zeros((n, n));
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda <= EIGEN_EPS {
            continue;
        }
        for i in 0..n {
            let coeff = q[(i, k)] / lambda;
            for j in 0..n {
                out[[i, j]] += coeff * q[(j, k)];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The pseudoinverse of a full-rank correlated information matrix.
    // - Sandwich inflation under an overdispersed meat.
    // - Condition numbers and the singular-direction cut-off.
    //
    // They intentionally DO NOT cover:
    // - Finite-difference information of fitted mixtures (see the model
    //   tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check `J⁺ = J⁻¹` for a full-rank, non-diagonal matrix.
    //
    // Given
    // -----
    // - J = [[2, 1], [1, 2]], whose inverse is [[2, −1], [−1, 2]] / 3.
    //
    // Expect
    // ------
    // - Entry-wise agreement to 1e-12.
    fn full_rank_information_is_inverted() {
        let cov = covariance_from_information(&array![[2.0, 1.0], [1.0, 2.0]], None);
        assert_relative_eq!(cov[[0, 0]], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[0, 1]], -1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov[[1, 1]], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify that an overdispersed meat inflates the sandwich covariance.
    //
    // Given
    // -----
    // - J = I₂ and S = 2 I₂.
    //
    // Expect
    // ------
    // - Classical covariance I₂, sandwich 2 I₂.
    fn sandwich_inflates_classical() {
        let j = array![[1.0, 0.0], [0.0, 1.0]];
        let s = array![[2.0, 0.0], [0.0, 2.0]];
        let classical = covariance_from_information(&j, None);
        let robust = covariance_from_information(&j, Some(&s));
        assert_relative_eq!(classical[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(robust[[0, 0]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(robust[[1, 1]], 2.0, epsilon = 1e-12);
        assert_relative_eq!(robust[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Check the condition number and the eigenvalue cut-off.
    //
    // Given
    // -----
    // - diag(4, 1) and diag(1, 0).
    //
    // Expect
    // ------
    // - Condition numbers 0.25 and 0; the singular direction gets zero
    //   variance.
    fn condition_number_and_singular_direction() {
        let a = array![[4.0, 0.0], [0.0, 1.0]];
        let singular = array![[1.0, 0.0], [0.0, 0.0]];
        assert_relative_eq!(condition_number(&a), 0.25, epsilon = 1e-12);
        assert!(condition_number(&singular) < 1e-12);
        let cov = covariance_from_information(&singular, None);
        assert_relative_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert!(cov[[1, 1]].abs() < 1e-12);
    }
}
