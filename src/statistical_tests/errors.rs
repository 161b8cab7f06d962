//! statistical_tests::errors — shared error types and Python bridges.
//!
//! Purpose
//! -------
//! Provide the error enum and result alias for the class-enumeration tests
//! (VLMR / LMR, bootstrap LRT) and the BCH auxiliary-variable analysis,
//! together with a conversion layer to Python exceptions for PyO3-based
//! bindings.
//!
//! Key behaviors
//! -------------
//! - Define [`TestResult`] and [`TestError`] as the canonical result and
//!   error types for every routine under `statistical_tests`.
//! - Wrap failures of the underlying fits ([`MixtureError`]) and of the
//!   covariance machinery (inference errors, as text) so callers match on a
//!   single enum.
//! - Implement `From<TestError> for PyErr` mapping to `PyValueError`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Test routines validate their inputs (nesting, sample sizes, draw
//!   counts, auxiliary lengths) and return [`TestResult<T>`] instead of
//!   panicking.
//! - `TestError` values are small and cheap to clone.
//!
//! Conventions
//! -----------
//! - Error messages are phrased in terms of domain constraints ("the
//!   alternative must have more classes", "draws must be at least 1").
//!
//! Testing notes
//! -------------
//! - Unit tests verify that `Display` embeds payloads and that mixture
//!   errors pass through unchanged.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

use crate::{inference::errors::InferenceError, mixture::errors::MixtureError};

pub type TestResult<T> = Result<T, TestError>;

/// TestError — error conditions for likelihood-ratio tests and BCH.
///
/// Variants
/// --------
/// - `NotNested { null_k, alt_k }`
///   The alternative model does not have more classes than the null.
/// - `SampleSizeMismatch { null_n, alt_n }`
///   The two fits were estimated on different numbers of observations.
/// - `InvalidDraws { draws }`
///   A Monte Carlo or bootstrap draw count of zero.
/// - `NoBootstrapDraws { requested }`
///   Every bootstrap replicate failed or the run was stopped before the
///   first one completed.
/// - `SingularClassification`
///   The BCH classification-error matrix cannot be inverted.
/// - `DegenerateClass { class }`
///   A class has no effective weight for the BCH mean.
/// - `AuxiliaryLengthMismatch { expected, found }`
///   The auxiliary variable does not have one entry per observation.
/// - `InvalidDistribution { text }`
///   A reference distribution could not be constructed.
/// - `EigenDecompositionFailed`
///   The weight matrix of the VLMR test has non-finite eigenvalues.
/// - `InvalidClassRange { k_min, k_max }`
///   A model-selection range with `k_min < 1` or `k_max < k_min`.
/// - `Mixture(MixtureError)`
///   A fit or simulation failed.
/// - `Inference(String)`
///   Covariance or score computation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum TestError {
    // ---- Nesting ----
    NotNested { null_k: usize, alt_k: usize },
    SampleSizeMismatch { null_n: usize, alt_n: usize },

    // ---- Draws ----
    InvalidDraws { draws: usize },
    NoBootstrapDraws { requested: usize },

    // ---- BCH ----
    SingularClassification,
    DegenerateClass { class: usize },
    AuxiliaryLengthMismatch { expected: usize, found: usize },

    // ---- Numerics ----
    InvalidDistribution { text: String },
    EigenDecompositionFailed,

    // ---- Selection ----
    InvalidClassRange { k_min: usize, k_max: usize },

    // ---- Passthrough ----
    Mixture(MixtureError),
    Inference(String),
}

impl std::error::Error for TestError {}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::NotNested { null_k, alt_k } => write!(
                f,
                "The alternative must have more classes than the null (null K = {null_k}, alternative K = {alt_k})."
            ),
            TestError::SampleSizeMismatch { null_n, alt_n } => write!(
                f,
                "Nested models were fitted on different samples (n = {null_n} vs n = {alt_n})."
            ),
            TestError::InvalidDraws { draws } => {
                write!(f, "Invalid draw count {draws}: draws must be at least 1.")
            }
            TestError::NoBootstrapDraws { requested } => {
                write!(f, "None of the {requested} bootstrap draws completed.")
            }
            TestError::SingularClassification => {
                write!(f, "Classification error matrix is singular.")
            }
            TestError::DegenerateClass { class } => {
                write!(f, "Class {class} has no effective weight for the auxiliary mean.")
            }
            TestError::AuxiliaryLengthMismatch { expected, found } => write!(
                f,
                "Auxiliary variable has {found} values, expected one per observation ({expected})."
            ),
            TestError::InvalidDistribution { text } => {
                write!(f, "Invalid reference distribution: {text}")
            }
            TestError::EigenDecompositionFailed => {
                write!(f, "Eigenvalues of the likelihood-ratio weight matrix are not finite.")
            }
            TestError::InvalidClassRange { k_min, k_max } => write!(
                f,
                "Invalid class range [{k_min}, {k_max}]: need 1 ≤ k_min ≤ k_max."
            ),
            TestError::Mixture(err) => write!(f, "{err}"),
            TestError::Inference(text) => write!(f, "Inference failed: {text}"),
        }
    }
}

impl From<MixtureError> for TestError {
    fn from(err: MixtureError) -> Self {
        TestError::Mixture(err)
    }
}

impl From<InferenceError> for TestError {
    fn from(err: InferenceError) -> Self {
        TestError::Inference(err.to_string())
    }
}

#[cfg(feature = "python-bindings")]
impl From<TestError> for PyErr {
    fn from(err: TestError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Embedding of payload values into `Display` messages.
    // - Passthrough of mixture errors.
    //
    // They intentionally DO NOT cover:
    // - The `From<TestError> for PyErr` conversion, which requires linking
    //   against the Python C API.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that nesting errors report both class counts.
    //
    // Given
    // -----
    // - `TestError::NotNested { null_k: 3, alt_k: 2 }`.
    //
    // Expect
    // ------
    // - The message contains "3" and "2".
    fn not_nested_includes_both_class_counts() {
        // Arrange
        let err = TestError::NotNested { null_k: 3, alt_k: 2 };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("K = 3") && msg.contains("K = 2"), "Got: {msg}");
    }

    #[test]
    // Purpose
    // -------
    // Ensure mixture errors keep their message when wrapped.
    //
    // Given
    // -----
    // - `MixtureError::ModelNotFitted`.
    //
    // Expect
    // ------
    // - The wrapped error displays the same text.
    fn mixture_errors_pass_through() {
        let inner = MixtureError::ModelNotFitted;
        let wrapped: TestError = inner.clone().into();
        assert_eq!(wrapped.to_string(), inner.to_string());
        assert_eq!(wrapped, TestError::Mixture(inner));
    }
}
