//! inference — standard errors, sandwich covariance and Wald tables.
//!
//! Purpose
//! -------
//! Provide tools for post-estimation uncertainty quantification on top of a
//! fitted mixture. This module computes classical (observed-information)
//! and robust (sandwich) covariance matrices from per-observation scores,
//! all expressed in the reporting parameter vector `θ`, and turns them into
//! labelled parameter tables with Wald z-tests.
//!
//! Key behaviors
//! -------------
//! - Define a unified error and result type, [`InferenceError`] and
//!   [`InferenceResult`], for inference-specific failures (shape
//!   mismatches, empty or non-finite scores, distribution construction).
//! - Build the outer-product-of-gradients matrix of average scores via
//!   [`average_score_covariance`].
//! - Convert observed information into parameter covariance with
//!   [`covariance_from_information`], supporting the classical `J⁺` and the
//!   sandwich `J⁺ S J⁺` ([`VarianceEstimator`]).
//! - Report weak identification through [`condition_number`].
//! - Assemble [`ParameterEstimate`] rows with z statistics and two-tailed
//!   p-values via [`wald_table`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Per-observation scores are supplied with shape `n × p`, rows for
//!   observations and columns aligned with `θ`.
//! - Observations are independent, so the OPG matrix needs no lag
//!   weighting.
//! - Covariance matrices are treated as `p × p` symmetric objects; the
//!   pseudoinverse drops eigenvalues below a fixed floor.
//! - All numerical routines return [`InferenceError`] (or the optimizer's
//!   `OptError`) on failure rather than panicking.
//!
//! Conventions
//! -----------
//! - Covariances produced here are on the average-log-likelihood scale;
//!   divide by `n` for `Var(θ̂)`. The model layer does this for callers.
//! - All functions are pure with respect to I/O: no logging, no global
//!   state, and no `unsafe` code paths.
//!
//! Downstream usage
//! ----------------
//! - `MixtureModel::covariance_matrix` and `parameter_estimates` wrap this
//!   module; the VLMR test reuses [`average_score_covariance`] and
//!   [`covariance_from_information`] for both nested models.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the OPG formula, pseudoinverse covariance,
//!   sandwich inflation, condition numbers of singular
//!   matrices and Wald p-values.
//! - Model-level tests check standard errors of fitted mixtures against
//!   closed-form approximations on well separated data.

pub mod errors;
pub mod hessian;
pub mod scores;
pub mod wald;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::errors::{InferenceError, InferenceResult};
pub use self::hessian::{VarianceEstimator, condition_number, covariance_from_information};
pub use self::scores::average_score_covariance;
pub use self::wald::{ParameterEstimate, ParameterTable, wald_table};

// ---- Optional convenience prelude for downstream crates ------------------
//
// Downstream crates can `use rust_mixture::inference::prelude::*;` to
// import the primary inference surface in a single line.

pub mod prelude {
    pub use super::errors::{InferenceError, InferenceResult};
    pub use super::hessian::{VarianceEstimator, covariance_from_information};
    pub use super::wald::{ParameterEstimate, ParameterTable};
}
