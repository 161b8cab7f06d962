//! inference::wald — parameter tables with Wald z-tests.
//!
//! Each row pairs an estimate with its standard error, `z = estimate / SE`
//! and the two-tailed standard normal p-value `2(1 − Φ(|z|))`. When the
//! standard error is zero or not finite, `z` and the p-value are `None`
//! rather than infinite or NaN.
//!
//! [`ParameterTable`] carries the rows together with the estimator used and
//! the condition number of the information matrix they were derived from,
//! so an ill-conditioned solution is visible next to its standard errors.
use statrs::distribution::{ContinuousCDF, Normal};

use crate::inference::{
    errors::{InferenceError, InferenceResult},
    hessian::VarianceEstimator,
};

/// One row of a parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEstimate {
    /// Parameter kind and variable, e.g. `Mean(y1)`.
    pub label: String,
    /// 0-based class, `None` for class-invariant entries.
    pub class: Option<usize>,
    pub estimate: f64,
    pub std_error: f64,
    pub z: Option<f64>,
    pub p_value: Option<f64>,
}

/// Wald rows plus the diagnostics they were computed under.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    pub rows: Vec<ParameterEstimate>,
    pub estimator: VarianceEstimator,
    /// `λ_min / λ_max` of the observed information; near zero flags weak
    /// identification. Reported only, never an error.
    pub condition_number: f64,
}

impl ParameterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row with `label` for `class`.
    pub fn row(&self, label: &str, class: Option<usize>) -> Option<&ParameterEstimate> {
        self.rows.iter().find(|r| r.label == label && r.class == class)
    }
}

/// Build a Wald table from aligned labels, estimates and standard errors.
///
/// # Errors
/// - `DimensionMismatch` when the three inputs differ in length.
/// - `InvalidDistribution` if the standard normal cannot be constructed.
pub fn wald_table(
    labels: &[(String, Option<usize>)], estimates: &[f64], std_errors: &[f64],
) -> InferenceResult<Vec<ParameterEstimate>> {
    if estimates.len() != labels.len() {
        return Err(InferenceError::DimensionMismatch {
            what: "estimates",
            expected: labels.len(),
            found: estimates.len(),
        });
    }
    if std_errors.len() != labels.len() {
        return Err(InferenceError::DimensionMismatch {
            what: "std_errors",
            expected: labels.len(),
            found: std_errors.len(),
        });
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| InferenceError::InvalidDistribution { text: e.to_string() })?;
    Ok(labels
        .iter()
        .zip(estimates.iter().zip(std_errors))
        .map(|((label, class), (&estimate, &std_error))| {
            let z = (std_error.is_finite() && std_error > 0.0).then(|| estimate / std_error);
            let p_value = z.map(|z| 2.0 * (1.0 - normal.cdf(z.abs())));
            ParameterEstimate { label: label.clone(), class: *class, estimate, std_error, z, p_value }
        })
        .collect())
}
