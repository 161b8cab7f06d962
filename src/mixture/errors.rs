//! Errors for finite mixture models (data validation, option checks,
//! parameter mappings, EM and start-search failures).
//!
//! This module defines the model error type [`MixtureError`] used across the
//! Rust core and, behind the `python-bindings` feature, converted to `PyErr`
//! at the PyO3 boundary.
//!
//! ## Conventions
//! - **Indices are 0-based** (rows, columns, classes) except for loader line
//!   numbers, which are 1-based to match what a user sees in a text editor.
//! - Missing indicator values are `NaN` internally and are never an error on
//!   their own; a row with *every* indicator missing is.
//! - Optimizer/backend errors from the inner membership step are normalized
//!   to [`MixtureError::OptimizationFailed`] with a human-readable status.
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*};

use crate::{inference::errors::InferenceError, optimization::errors::OptError};

/// Crate-wide result alias for mixture operations that may produce
/// [`MixtureError`].
pub type MixtureResult<T> = Result<T, MixtureError>;

/// Unified error type for mixture modeling.
///
/// Covers input/data validation, loader parse failures, option and shape
/// checks, parameter-vector mappings, and estimation failures. Conditions
/// that are reported rather than fatal (non-convergence, unreplicated
/// optima, ill-conditioned information) are *not* represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum MixtureError {
    // ---- Input/data validation ----
    /// Data set has no observations.
    EmptyData,

    /// No indicator columns were supplied.
    NoIndicators,

    /// Indicator kinds or names do not match the number of columns.
    RaggedColumns { expected: usize, found: usize },

    /// Every indicator of an observation is missing.
    AllMissingRow { row: usize },

    /// Covariates must be finite (no missing values allowed).
    NonFiniteCovariate { row: usize, col: usize, value: f64 },

    /// Covariate matrix has a different number of rows than the indicators.
    CovariateRowMismatch { expected: usize, found: usize },

    /// Categorical indicator needs at least two observed levels.
    TooFewCategories { column: usize, levels: usize },

    /// Continuous indicator has fewer than two observed values or zero variance.
    DegenerateIndicator { column: usize, reason: &'static str },

    /// Non-missing indicator value is ±inf.
    NonFiniteData { row: usize, col: usize, value: f64 },

    // ---- Loader ----
    /// A data line has the wrong number of fields.
    WrongColumnCount { line: usize, expected: usize, found: usize },

    /// A field could not be parsed as a finite number.
    MalformedValue { line: usize, column: usize, token: String },

    /// A requested variable name was not declared.
    UnknownVariable { name: String },

    /// A variable name was declared or requested twice.
    DuplicateVariable { name: String },

    /// Underlying I/O failure while reading input.
    Io { text: String },

    // ---- Options / shape ----
    /// Number of latent classes is invalid.
    InvalidClassCount { k: usize, reason: &'static str },

    /// A tolerance must be finite and strictly positive.
    InvalidTolerance { name: &'static str, value: f64, reason: &'static str },

    /// Any other invalid option value.
    InvalidOption { name: &'static str, reason: &'static str },

    // ---- Parameters ----
    /// Parameter vector length does not match the model layout.
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Parameter vector contains a non-finite entry.
    NonFiniteTheta { index: usize, value: f64 },

    /// Class variance must be finite and strictly positive.
    InvalidVariance { indicator: usize, class: usize, value: f64 },

    /// Parameter blocks do not line up with the data layout.
    LayoutMismatch { reason: &'static str },

    // ---- Fitting ----
    /// Log-likelihood evaluated to a non-finite value.
    NonFiniteLogLik { value: f64 },

    /// Every random start failed numerically.
    AllStartsFailed { attempted: usize },

    /// Inner optimizer failure, carried as its rendered status.
    OptimizationFailed { status: String },

    /// Standard errors or information matrix could not be formed.
    InferenceFailed { text: String },

    /// Results were requested before `fit` completed.
    ModelNotFitted,

    /// Worker pool could not be constructed.
    ThreadPool { text: String },

    // ---- Fallback ----
    UnknownError,
}

impl std::error::Error for MixtureError {}

impl std::fmt::Display for MixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Input/data validation ----
            MixtureError::EmptyData => write!(f, "Data set contains no observations"),
            MixtureError::NoIndicators => write!(f, "At least one indicator is required"),
            MixtureError::RaggedColumns { expected, found } => {
                write!(f, "Column specification mismatch: expected {expected}, found {found}")
            }
            MixtureError::AllMissingRow { row } => {
                write!(f, "Observation {row} has every indicator missing")
            }
            MixtureError::NonFiniteCovariate { row, col, value } => {
                write!(f, "Covariate at ({row}, {col}) is {value}; covariates must be finite")
            }
            MixtureError::CovariateRowMismatch { expected, found } => {
                write!(f, "Covariate rows mismatch: expected {expected}, found {found}")
            }
            MixtureError::TooFewCategories { column, levels } => {
                write!(
                    f,
                    "Categorical indicator {column} has {levels} observed level(s); at least 2 required"
                )
            }
            MixtureError::DegenerateIndicator { column, reason } => {
                write!(f, "Continuous indicator {column} is degenerate: {reason}")
            }
            MixtureError::NonFiniteData { row, col, value } => {
                write!(f, "Indicator value at ({row}, {col}) is {value}, must be finite or missing")
            }

            // ---- Loader ----
            MixtureError::WrongColumnCount { line, expected, found } => {
                write!(f, "Line {line}: expected {expected} fields, found {found}")
            }
            MixtureError::MalformedValue { line, column, token } => {
                write!(f, "Line {line}, field {column}: cannot parse '{token}' as a number")
            }
            MixtureError::UnknownVariable { name } => write!(f, "Unknown variable '{name}'"),
            MixtureError::DuplicateVariable { name } => {
                write!(f, "Variable '{name}' is declared more than once")
            }
            MixtureError::Io { text } => write!(f, "I/O error: {text}"),

            // ---- Options / shape ----
            MixtureError::InvalidClassCount { k, reason } => {
                write!(f, "Invalid number of classes {k}: {reason}")
            }
            MixtureError::InvalidTolerance { name, value, reason } => {
                write!(f, "Invalid tolerance {name} = {value}: {reason}")
            }
            MixtureError::InvalidOption { name, reason } => {
                write!(f, "Invalid option '{name}': {reason}")
            }

            // ---- Parameters ----
            MixtureError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, actual {actual}")
            }
            MixtureError::NonFiniteTheta { index, value } => {
                write!(f, "Theta entry {index} is {value}, must be finite")
            }
            MixtureError::InvalidVariance { indicator, class, value } => {
                write!(
                    f,
                    "Variance of indicator {indicator} in class {class} is {value}, must be finite and > 0"
                )
            }
            MixtureError::LayoutMismatch { reason } => {
                write!(f, "Parameter layout mismatch: {reason}")
            }

            // ---- Fitting ----
            MixtureError::NonFiniteLogLik { value } => {
                write!(f, "Log-likelihood evaluated to a non-finite value: {value}")
            }
            MixtureError::AllStartsFailed { attempted } => {
                write!(f, "All {attempted} random starts failed")
            }
            MixtureError::OptimizationFailed { status } => {
                write!(f, "Optimization failed: {status}")
            }
            MixtureError::InferenceFailed { text } => write!(f, "Inference failed: {text}"),
            MixtureError::ModelNotFitted => {
                write!(f, "Model has not been fitted yet; call fit first")
            }
            MixtureError::ThreadPool { text } => write!(f, "Worker pool error: {text}"),

            // ---- Fallback ----
            MixtureError::UnknownError => write!(f, "Unknown error"),
        }
    }
}

impl From<OptError> for MixtureError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::ThetaLengthMismatch { expected, actual } => {
                MixtureError::ThetaLengthMismatch { expected, actual }
            }
            OptError::InvalidThetaInput { index, value } => {
                MixtureError::NonFiniteTheta { index, value }
            }
            OptError::NonFiniteLogLik { value } => MixtureError::NonFiniteLogLik { value },
            other => MixtureError::OptimizationFailed { status: other.to_string() },
        }
    }
}

impl From<InferenceError> for MixtureError {
    fn from(err: InferenceError) -> Self {
        MixtureError::InferenceFailed { text: err.to_string() }
    }
}

impl From<std::io::Error> for MixtureError {
    fn from(err: std::io::Error) -> Self {
        MixtureError::Io { text: err.to_string() }
    }
}

#[cfg(feature = "python-bindings")]
impl From<MixtureError> for PyErr {
    fn from(err: MixtureError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
