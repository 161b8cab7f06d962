//! Shape and finiteness checks shared by the optimizer.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::types::{Grad, Hessian, Theta},
};

/// Tolerances must be finite and strictly positive; the error is the reason
/// text for the caller's variant.
pub fn verify_tol(tol: f64) -> Result<(), &'static str> {
    if !tol.is_finite() {
        return Err("Tolerance must be finite.");
    }
    if tol <= 0.0 {
        return Err("Tolerance must be positive.");
    }
    Ok(())
}

/// # Errors
/// - `GradientDimMismatch` for a wrong length.
/// - `InvalidGradient` at the first non-finite entry.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    match grad.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidGradient {
            index,
            value: grad[index],
            reason: "Gradient elements must be finite.",
        }),
        None => Ok(()),
    }
}

/// Unwrap the solver's best parameter, which must exist and be finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let theta = theta_hat.ok_or(OptError::MissingThetaHat)?;
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidThetaHat {
            index,
            value: theta[index],
            reason: "Parameter estimates must be finite.",
        }),
        None => Ok(theta),
    }
}

pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// # Errors
/// - `HessianDimMismatch` unless `dim × dim`.
/// - `InvalidHessian` at the first non-finite entry.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    match hessian.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), &value)) => Err(OptError::InvalidHessian { row, col, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Report the first offending entry of gradients, estimates and Hessians.
    //
    // Given
    // -----
    // - Inputs with a NaN or infinity at a known position, and a wrong shape.
    //
    // Expect
    // ------
    // - The matching variant carrying that position.
    fn first_bad_entry_is_reported() {
        assert!(verify_tol(1e-8).is_ok());
        assert!(verify_tol(0.0).is_err());
        assert!(matches!(
            validate_grad(&array![0.0, f64::NAN], 2),
            Err(OptError::InvalidGradient { index: 1, .. })
        ));
        assert_eq!(
            validate_grad(&array![0.0], 2),
            Err(OptError::GradientDimMismatch { expected: 2, found: 1 })
        );
        assert!(matches!(
            validate_theta_hat(Some(array![1.0, f64::INFINITY])),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert!(matches!(
            validate_hessian(&array![[1.0, 0.0], [f64::NAN, 1.0]], 2),
            Err(OptError::InvalidHessian { row: 1, col: 0, .. })
        ));
        assert!(matches!(
            validate_hessian(&array![[1.0, 0.0]], 2),
            Err(OptError::HessianDimMismatch { expected: 2, found: (1, 2) })
        ));
    }
}
