//! models — EM fitting, start search and the fitted mixture model.
//!
//! Purpose
//! -------
//! Turn validated data and a class-count shape into a fitted, canonically
//! labelled mixture. This layer sits on top of `mixture::core`, wiring the
//! E-step / M-step kernels, the random-start generator and the worker pool
//! into a single [`MixtureModel`] facade.
//!
//! Key behaviors
//! -------------
//! - [`em`]: EM iterations for one start with status reporting
//!   ([`EMStatus`]) and a per-iteration log-likelihood trace.
//! - [`membership`]: the inner multinomial-logit M-step for covariate
//!   models, solved with the crate's L-BFGS optimizer.
//! - [`multistart`]: two-stage parallel start search, reduction to the best
//!   converged start and the replication verdict.
//! - [`scores`]: analytic per-observation scores in θ.
//! - [`fit`]: the frozen [`FitResult`] summary.
//! - [`mixture`]: [`MixtureModel`] with `fit`, standard errors, Wald tables,
//!   save output and simulation.
//!
//! Invariants & assumptions
//! ------------------------
//! - The per-start log-likelihood trace is non-decreasing up to
//!   floating-point noise.
//! - Start outcomes are reduced in start order, so results do not depend
//!   on the number of workers.
//! - Stored parameters and posteriors are always in canonical class order.
//!
//! Conventions
//! -----------
//! - θ is the reporting parameterization: free logits, means, variances
//!   and ordered logistic thresholds.
//! - Errors are reported as [`MixtureResult`](crate::mixture::errors::MixtureResult);
//!   non-convergence and stop requests are statuses, not errors.
//!
//! Downstream usage
//! ----------------
//! - Build a [`MixtureModel`] from a shape and [`FitOptions`](crate::mixture::core::FitOptions),
//!   call `fit(&data)`, then read `result()`, `params()`, `posterior()` or
//!   `parameter_estimates(&data, estimator)`.
//! - Model-selection code fits one `MixtureModel` per class count.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule cover monotone EM traces, status
//!   handling, worker-count determinism, analytic scores against finite
//!   differences and standard errors on well separated data.

pub mod em;
pub mod fit;
pub mod membership;
pub mod mixture;
pub mod multistart;
pub mod scores;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::em::{EMOutcome, EMStatus, run_em};
pub use self::fit::FitResult;
pub use self::membership::{MembershipData, MembershipLogit, update_membership};
pub use self::mixture::MixtureModel;
pub use self::multistart::{StartSearch, StartSummary, search_starts};
pub use self::scores::{observation_scores, score_sum};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::mixture::models::prelude::*;
//
// to import the main model surface in a single line.

pub mod prelude {
    pub use super::em::EMStatus;
    pub use super::fit::FitResult;
    pub use super::mixture::MixtureModel;
}
