//! statistical_tests — class-enumeration tests and auxiliary comparisons.
//!
//! Purpose
//! -------
//! Provide the hypothesis tests used after fitting mixtures: likelihood
//! ratio tests comparing K − 1 against K classes, and the BCH comparison of
//! a distal variable across fitted classes.
//!
//! Key behaviors
//! -------------
//! - [`vlmr`]: Vuong–Lo–Mendell–Rubin test and the Lo–Mendell–Rubin
//!   adjusted statistic, with a Monte Carlo weighted χ² reference and a
//!   plain χ² fallback ([`VlmrOutcome`]).
//! - [`bootstrap_lrt`]: parametric bootstrap LRT run on the worker pool,
//!   cancellable through `RunControl` ([`BootstrapOutcome`]).
//! - [`bch`]: BCH-weighted class means, sandwich covariance, overall and
//!   pairwise χ² tests ([`BchOutcome`]).
//! - [`errors`]: [`TestError`] / [`TestResult`].
//!
//! Invariants & assumptions
//! ------------------------
//! - LRTs require fitted models on the same data with `K_alt > K_null`.
//! - Outcomes are value objects with private fields and getters; they do
//!   not own the data or the models.
//!
//! Conventions
//! -----------
//! - p-values are upper-tail probabilities in `[0, 1]`.
//! - Randomness is seeded explicitly; identical inputs give identical
//!   outcomes.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the weighted χ² reference against closed-form χ²
//!   tails, the block layout of Vuong's matrix, bootstrap determinism
//!   across worker counts and the BCH formulas under hard assignments.
//! - The model-selection integration test exercises VLMR and the bootstrap
//!   on separated data.

pub mod bch;
pub mod bootstrap_lrt;
pub mod errors;
pub mod vlmr;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::bch::{BchOutcome, ChiSquareTest, PairwiseTest};
pub use self::bootstrap_lrt::{BootstrapOptions, BootstrapOutcome};
pub use self::errors::{TestError, TestResult};
pub use self::vlmr::{VlmrOptions, VlmrOutcome, VlmrReference};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::statistical_tests::prelude::*;
//
// to import the main statistical-testing surface in a single line.

pub mod prelude {
    pub use super::bch::BchOutcome;
    pub use super::bootstrap_lrt::{BootstrapOptions, BootstrapOutcome};
    pub use super::errors::{TestError, TestResult};
    pub use super::vlmr::{VlmrOptions, VlmrOutcome};
}
