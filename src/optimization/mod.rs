//! optimization — L-BFGS maximization, numerical derivatives and stable
//! transforms shared by the mixture and inference layers.
//!
//! Purpose
//! -------
//! Keep every generic numerical routine in one place so the model code only
//! expresses mixture semantics: the covariate M-step hands a weighted logit
//! to [`loglik_optimizer::maximize`], the E-step normalizes log joint
//! densities with [`numerical_stability`], and the inference layer asks
//! [`loglik_optimizer::finite_diff`] for observed information.
//!
//! Key behaviors
//! -------------
//! - `loglik_optimizer`: the [`LogLikelihood`](loglik_optimizer::LogLikelihood)
//!   trait, the Argmin-backed L-BFGS driver and finite-difference helpers.
//! - `numerical_stability`: log-sum-exp, softmax, logistic / logit and the
//!   probability and variance floors.
//! - `errors`: [`OptError`](errors::OptError), the single error surface for
//!   both, with conversions from Argmin and mixture errors.
//!
//! Invariants & assumptions
//! ------------------------
//! - Solvers maximize `ℓ(θ)` by minimizing `−ℓ(θ)`; callers always speak in
//!   log-likelihood terms.
//! - Accepted parameters, gradients and Hessians are finite; anything else
//!   surfaces as an `OptError`, never a panic.
//!
//! Conventions
//! -----------
//! - `ndarray` containers throughout (`Theta`, `Grad`, `Hessian`).
//! - Only `trace!`-level events are emitted here; progress reporting
//!   belongs to the fitting layer.
//!
//! Testing notes
//! -------------
//! - Each submodule tests its own concern on closed-form objectives; the
//!   mixture tests exercise the optimizer on real weighted logits.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
