//! core — shared mixture data, parameters, E/M-steps and start generation.
//!
//! Purpose
//! -------
//! Collect the building blocks for finite mixture models with continuous
//! (latent profile) and categorical (latent class) indicators: validated
//! data containers and a text loader, model shape and option types, the
//! parameter container and its θ-mapping, the E-step and closed-form
//! M-step, starting values, simulation, cancellation control and the save
//! file. Higher-level estimation in `mixture::models` builds on these.
//!
//! Key behaviors
//! -------------
//! - Data enter through [`MixtureData`] (from matrices) or [`DataLoader`] →
//!   [`RawTable`] (from text) and are validated once.
//! - [`MixtureShape`] + [`MixtureParams`] describe a K-class model; the
//!   reporting vector θ is produced by `to_theta` / `from_theta`.
//! - [`e_step`] and the [`mstep`] updates are the numerical kernels of EM.
//! - [`generate_starts`] produces the deterministic base start and seeded
//!   perturbations; [`simulate`] draws data from fitted parameters.
//! - [`RunControl`] carries cancellation and deadlines into every worker.
//!
//! Invariants & assumptions
//! ------------------------
//! - Missing indicator values are `NaN` / `None`; rows are never entirely
//!   missing; covariates are complete.
//! - Parameters always satisfy: proportions and category probabilities sum
//!   to one, variances are strictly positive, the last logit row is zero.
//! - Kernels (E-step, M-step, transforms) do not log; start fallbacks and
//!   data loading emit `tracing` events.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based (observation `i`, indicator `j`, class `k`, level
//!   `c`); reported class numbers in the save file are 1-based.
//! - The last class is the logit reference class.
//!
//! Downstream usage
//! ----------------
//! - `mixture::models` drives EM and the multi-start search with these types.
//! - `selection` and `statistical_tests` consume posteriors and parameters.
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own behavior; end-to-end
//!   behavior is covered by the integration tests under `tests/`.

pub mod control;
pub mod data;
pub mod init;
pub mod loader;
pub mod mstep;
pub mod options;
pub mod params;
pub mod posterior;
pub mod save;
pub mod shape;
pub mod simulate;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::control::{RunControl, StopReason, run_in_pool};
pub use self::data::{Indicator, IndicatorKind, IndicatorMoments, MixtureData};
pub use self::init::{RandomStart, clustering, generate_starts, perturbed, unperturbed};
pub use self::loader::{DataLoader, Delimiter, RawTable};
pub use self::options::{BaseStart, EMOptions, EMTolerances, FitOptions, StartOptions};
pub use self::params::{IndicatorParams, MixtureParams, ParamLabel};
pub use self::posterior::{PosteriorMatrix, e_step, loglik, loglik_contributions};
pub use self::save::{SaveOptions, format_save, write_save};
pub use self::shape::{MixtureShape, VarianceStructure};
pub use self::simulate::simulate;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::mixture::core::prelude::*;
//
// to import the main mixture core surface in a single line.

pub mod prelude {
    pub use super::control::RunControl;
    pub use super::data::{IndicatorKind, MixtureData};
    pub use super::loader::{DataLoader, Delimiter, RawTable};
    pub use super::options::{BaseStart, EMOptions, EMTolerances, FitOptions, StartOptions};
    pub use super::params::{IndicatorParams, MixtureParams};
    pub use super::posterior::PosteriorMatrix;
    pub use super::save::SaveOptions;
    pub use super::shape::{MixtureShape, VarianceStructure};
}
