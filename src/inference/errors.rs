//! Unified error handling for inference routines.
//!
//! This module defines `InferenceError`, the central error type used by
//! score covariance estimation, Wald tables and related inference
//! utilities. It groups together shape, score and distribution failures.
//! An alias `InferenceResult<T>`
//! standardizes the return type across inference code.

/// Unified error type for inference routines.
///
/// Covers mismatched dimensions between estimates, labels and standard
/// errors, empty or non-finite score matrices and distribution
/// construction failures, with readable diagnostics through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    // ---- Shapes ----
    /// Two inputs that must align have different lengths.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    // ---- Scores ----
    /// The score matrix has no rows.
    EmptyScores,

    /// A score entry is NaN or infinite.
    NonFiniteScore {
        row: usize,
        col: usize,
        value: f64,
    },

    // ---- Distributions ----
    /// A reference distribution could not be constructed.
    InvalidDistribution {
        text: String,
    },
}

pub type InferenceResult<T> = Result<T, InferenceError>;

impl std::error::Error for InferenceError {}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Shapes ----
            InferenceError::DimensionMismatch { what, expected, found } => write!(
                f,
                "Inference Error: {what} has length {found}, expected {expected}"
            ),

            // ---- Scores ----
            InferenceError::EmptyScores => {
                write!(f, "Inference Error: Score matrix has no observations")
            }
            InferenceError::NonFiniteScore { row, col, value } => write!(
                f,
                "Inference Error: Non-finite score {value} at observation {row}, parameter {col}"
            ),

            // ---- Distributions ----
            InferenceError::InvalidDistribution { text } => {
                write!(f, "Inference Error: Invalid reference distribution: {text}")
            }
        }
    }
}
