//! loglik_optimizer::finite_diff — numerical gradients and Hessians.
//!
//! Purpose
//! -------
//! Differentiate objectives that have no analytic derivative: the cost of
//! a [`LogLikelihood`](super::LogLikelihood) without `grad`, and gradient
//! maps such as the averaged mixture score, whose Jacobian is the observed
//! information.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`] takes central differences first and retries with
//!   forward differences when an evaluation fails or the result is not
//!   finite (central steps can leave the domain near boundaries).
//! - [`compute_hessian`] differentiates a gradient map with the same
//!   central → forward fallback and symmetrizes the result.
//!
//! Invariants & assumptions
//! ------------------------
//! - `finitediff` closures return plain `f64`; the first evaluation error
//!   is captured in a cell, the closure yields `NaN`, and the captured
//!   error is surfaced after differencing.
//! - Returned gradients and Hessians pass [`validate_grad`] /
//!   [`validate_hessian`].
use std::cell::RefCell;

use finitediff::FiniteDiff;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{Grad, Hessian, Theta},
        validation::{validate_grad, validate_hessian},
    },
};

/// Numerical gradient of a fallible scalar function.
///
/// # Errors
/// - The first error raised by `func` on the forward-difference pass.
/// - `InvalidGradient` when the forward-difference gradient is still not
///   finite.
pub fn fd_gradient<G>(theta: &Theta, func: &G) -> OptResult<Grad>
where
    G: Fn(&Theta) -> OptResult<f64>,
{
    let dim = theta.len();
    let captured: RefCell<Option<OptError>> = RefCell::new(None);
    let plain = |t: &Theta| -> f64 {
        match func(t) {
            Ok(v) => v,
            Err(e) => {
                captured.borrow_mut().get_or_insert(e);
                f64::NAN
            }
        }
    };

    let central = theta.central_diff(&plain);
    if captured.borrow().is_none() && validate_grad(&central, dim).is_ok() {
        return Ok(central);
    }
    captured.replace(None);
    let forward = theta.forward_diff(&plain);
    if let Some(err) = captured.take() {
        return Err(err);
    }
    validate_grad(&forward, dim)?;
    Ok(forward)
}

/// Symmetrized Jacobian of the gradient map `f` at `theta`.
///
/// # Errors
/// - `HessianDimMismatch` / `InvalidHessian` when neither the central nor
///   the forward approximation is a finite square matrix.
pub fn compute_hessian<F: Fn(&Theta) -> Grad>(f: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut hess = theta.central_hessian(f);
    if validate_hessian(&hess, dim).is_err() {
        hess = theta.forward_hessian(f);
        validate_hessian(&hess, dim)?;
    }
    symmetrize(&mut hess);
    Ok(hess)
}

fn symmetrize(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
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
    // - Central gradients of a smooth function.
    // - The forward fallback when central steps leave the domain.
    // - Error capture from the objective.
    // - Hessians of a linear gradient map and symmetrization.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check the numerical gradient on a quadratic.
    //
    // Given
    // -----
    // - f(θ) = θ₀² + 3θ₀θ₁ at (1, 2).
    //
    // Expect
    // ------
    // - ∇f = (2θ₀ + 3θ₁, 3θ₀) = (8, 3).
    fn fd_gradient_matches_analytic() {
        let f = |t: &Theta| -> OptResult<f64> { Ok(t[0] * t[0] + 3.0 * t[0] * t[1]) };
        let g = fd_gradient(&array![1.0, 2.0], &f).unwrap();
        assert_relative_eq!(g[0], 8.0, epsilon = 1e-5);
        assert_relative_eq!(g[1], 3.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Fall back to forward differences at a domain boundary and propagate
    // objective errors.
    //
    // Given
    // -----
    // - f(θ) = θ ln θ that errors for θ < 0, evaluated at θ = 0 (central
    //   steps go negative, forward steps do not).
    // - An objective that always errors.
    //
    // Expect
    // ------
    // - A finite (very negative) forward gradient; the objective's error.
    fn fd_gradient_falls_back_and_propagates_errors() {
        let f = |t: &Theta| -> OptResult<f64> {
            if t[0] < 0.0 {
                Err(OptError::NonFiniteLogLik { value: f64::NAN })
            } else if t[0] == 0.0 {
                Ok(0.0)
            } else {
                Ok(t[0] * t[0].ln())
            }
        };
        let g = fd_gradient(&array![0.0], &f).unwrap();
        assert!(g[0].is_finite() && g[0] < 0.0);

        let bad = |_: &Theta| -> OptResult<f64> { Err(OptError::ModelError { text: "x".into() }) };
        assert_eq!(
            fd_gradient(&array![1.0], &bad),
            Err(OptError::ModelError { text: "x".into() })
        );
    }

    #[test]
    // Purpose
    // -------
    // Differentiate a linear gradient map and symmetrize.
    //
    // Given
    // -----
    // - g(θ) = A θ with A = [[2, 1], [0, 4]] (not symmetric).
    //
    // Expect
    // ------
    // - Diagonal (2, 4), both off-diagonals 0.5.
    fn hessian_is_symmetrized() {
        let g = |t: &Theta| -> Grad { array![2.0 * t[0] + t[1], 4.0 * t[1]] };
        let h = compute_hessian(&g, &array![0.3, -0.7]).unwrap();
        assert_relative_eq!(h[[0, 0]], 2.0, epsilon = 1e-6);
        assert_relative_eq!(h[[1, 1]], 4.0, epsilon = 1e-6);
        assert_relative_eq!(h[[0, 1]], 0.5, epsilon = 1e-6);
        assert_eq!(h[[0, 1]], h[[1, 0]]);
    }

    #[test]
    // Purpose
    // -------
    // Reject a gradient map that is never finite.
    //
    // Given
    // -----
    // - g(θ) = (NaN).
    //
    // Expect
    // ------
    // - `InvalidHessian`.
    fn non_finite_hessian_is_rejected() {
        let g = |_: &Theta| -> Grad { array![f64::NAN] };
        assert!(matches!(
            compute_hessian(&g, &array![1.0]),
            Err(OptError::InvalidHessian { .. })
        ));
    }
}
