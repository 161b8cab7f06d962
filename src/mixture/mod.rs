//! mixture — finite mixture stack: data, parameters, EM and fitted models.
//!
//! Purpose
//! -------
//! Provide the latent class / latent profile layer of the crate: validated
//! indicator data with optional membership covariates, mixture parameters,
//! EM kernels, multi-start search and the user-facing [`MixtureModel`].
//!
//! Key behaviors
//! -------------
//! - [`core`]: data containers and the delimited-text loader, shapes,
//!   options, parameters, E-step / M-step kernels, start generation,
//!   simulation, save output and run control.
//! - [`models`]: EM runs, the start search, analytic scores and
//!   [`MixtureModel`].
//! - [`errors`]: [`MixtureError`] / [`MixtureResult`] for every failure of
//!   this layer.
//!
//! Invariants & assumptions
//! ------------------------
//! - Continuous indicators are Gaussian within class; categorical
//!   indicators are multinomial within class; indicators are conditionally
//!   independent given class.
//! - Missing indicator values are ignored under MAR (full information).
//!
//! Downstream usage
//! ----------------
//! - Most callers need only the items in [`prelude`].

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    DataLoader, EMOptions, EMTolerances, FitOptions, IndicatorKind, IndicatorParams, MixtureData,
    MixtureParams, MixtureShape, PosteriorMatrix, RunControl, SaveOptions, StartOptions,
    StopReason, VarianceStructure,
};
pub use self::errors::{MixtureError, MixtureResult};
pub use self::models::{EMStatus, FitResult, MixtureModel};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::mixture::prelude::*;
//
// to import the main mixture surface in a single line.

pub mod prelude {
    pub use super::{
        DataLoader, EMOptions, EMStatus, EMTolerances, FitOptions, FitResult, IndicatorKind,
        IndicatorParams, MixtureData, MixtureError, MixtureModel, MixtureParams, MixtureResult,
        MixtureShape, PosteriorMatrix, RunControl, SaveOptions, StartOptions, VarianceStructure,
    };
}
