//! numerical_stability — numerically robust transforms and shared floors.
//!
//! Purpose
//! -------
//! Collect the numerically stable scalar and vector transforms used by
//! mixture estimation, together with the small tolerances and floors that
//! every layer must agree on. Centralizing them here lets the E-step,
//! M-step, parameter mappings and inference code assume well-conditioned
//! `f64` arithmetic.
//!
//! Key behaviors
//! -------------
//! - Normalize log class weights without overflow ([`log_sum_exp`],
//!   [`softmax_in_place`]); the returned normalizer is the observation's
//!   log-likelihood contribution.
//! - Map between cumulative probabilities and thresholds on the logit scale
//!   ([`safe_logistic`], [`safe_logit`], [`logistic_density`]).
//! - Keep probabilities away from zero ([`floor_and_normalize`]).
//! - Export the shared constants [`EIGEN_EPS`], [`GENERAL_TOL`],
//!   [`PROB_FLOOR`], [`VARIANCE_FLOOR_RATIO`], [`LOGIT_EPS`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite unless documented otherwise; `log_sum_exp`
//!   deliberately propagates `NaN` and `+∞` so broken likelihoods surface
//!   as errors upstream rather than being silently repaired.
//! - Floors are applied by the model layer at well-defined points (M-step,
//!   parameter construction); these helpers never decide *when* to floor.
//!
//! Conventions
//! -----------
//! - Functions operate on `f64` scalars, slices or `ndarray` views and
//!   mutate in place where that avoids allocation.
//! - No logging, I/O or global state.
//!
//! Downstream usage
//! ----------------
//! - `mixture::core::posterior` uses `softmax_in_place` for the E-step.
//! - `mixture::core::params` uses the logistic helpers for thresholds.
//! - `inference::hessian` uses `EIGEN_EPS` for pseudoinverses.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] cover agreement with naïve formulas
//!   on safe grids, tail behavior, and mass conservation.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    EIGEN_EPS, GENERAL_TOL, LOGIT_EPS, PROB_FLOOR, VARIANCE_FLOOR_RATIO, floor_and_normalize,
    log_sum_exp, logistic_density, safe_logistic, safe_logit, softmax_in_place,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::optimization::numerical_stability::prelude::*;
//
// to import the main numerical-stability surface in a single line.

pub mod prelude {
    pub use super::transformations::{
        EIGEN_EPS, GENERAL_TOL, PROB_FLOOR, VARIANCE_FLOOR_RATIO, log_sum_exp, safe_logistic,
        safe_logit, softmax_in_place,
    };
}
