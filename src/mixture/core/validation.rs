//! Validation helpers for mixture parameters and parameter vectors.
//!
//! Small, allocation-free checks shared by parameter construction
//! ([`MixtureParams`](crate::mixture::core::params::MixtureParams)), the
//! θ-mapping used by inference, and the posterior container. Each helper
//! returns the first violation it finds as a [`MixtureError`].
use ndarray::{ArrayView1, ArrayView2};

use crate::mixture::errors::{MixtureError, MixtureResult};

/// Tolerance for "sums to one" checks on probability vectors.
pub const SUM_TOL: f64 = 1e-8;

/// Check that `theta` has the expected length and only finite entries.
pub fn validate_theta(theta: ArrayView1<'_, f64>, expected: usize) -> MixtureResult<()> {
    if theta.len() != expected {
        return Err(MixtureError::ThetaLengthMismatch { expected, actual: theta.len() });
    }
    for (index, &value) in theta.iter().enumerate() {
        if !value.is_finite() {
            return Err(MixtureError::NonFiniteTheta { index, value });
        }
    }
    Ok(())
}

/// Check that each class variance is finite and strictly positive.
pub fn validate_variances(variances: ArrayView1<'_, f64>, indicator: usize) -> MixtureResult<()> {
    for (class, &value) in variances.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(MixtureError::InvalidVariance { indicator, class, value });
        }
    }
    Ok(())
}

/// Check that every row of `probs` is a probability vector: entries in
/// `[0, 1]` and a total within [`SUM_TOL`] of one.
pub fn validate_probability_rows(
    probs: ArrayView2<'_, f64>, reason: &'static str,
) -> MixtureResult<()> {
    for row in probs.rows() {
        let mut total = 0.0;
        for &p in row.iter() {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(MixtureError::LayoutMismatch { reason });
            }
            total += p;
        }
        if (total - 1.0).abs() > SUM_TOL {
            return Err(MixtureError::LayoutMismatch { reason });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Exercise the accept and reject paths of every helper.
    //
    // Given
    // -----
    // - Good and bad parameter vectors, variances and probability rows.
    //
    // Expect
    // ------
    // - Good inputs pass; each bad input yields its dedicated error.
    fn helpers_accept_valid_and_reject_invalid_inputs() {
        assert!(validate_theta(array![0.0, 1.0].view(), 2).is_ok());
        assert_eq!(
            validate_theta(array![0.0].view(), 2),
            Err(MixtureError::ThetaLengthMismatch { expected: 2, actual: 1 })
        );
        assert!(matches!(
            validate_theta(array![0.0, f64::NAN].view(), 2),
            Err(MixtureError::NonFiniteTheta { index: 1, .. })
        ));

        assert!(validate_variances(array![0.5, 1.0].view(), 0).is_ok());
        assert!(matches!(
            validate_variances(array![0.5, 0.0].view(), 3),
            Err(MixtureError::InvalidVariance { indicator: 3, class: 1, .. })
        ));

        assert!(validate_probability_rows(array![[0.2, 0.8], [1.0, 0.0]].view(), "rows").is_ok());
        assert!(validate_probability_rows(array![[0.2, 0.7]].view(), "rows").is_err());
        assert!(validate_probability_rows(array![[-0.2, 1.2]].view(), "rows").is_err());
    }
}
