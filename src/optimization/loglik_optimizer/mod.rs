//! loglik_optimizer — L-BFGS maximization and numerical derivatives.
//!
//! Purpose
//! -------
//! Maximize smooth log-likelihoods over an unconstrained parameter vector
//! and approximate their second derivatives. Inside the mixture code this
//! serves two consumers: the covariate M-step, which maximizes the
//! posterior-weighted multinomial logit of class membership, and the
//! inference layer, which differentiates averaged score vectors to build
//! observed information matrices.
//!
//! Key behaviors
//! -------------
//! - [`LogLikelihood`] is the single trait a model implements: value,
//!   validation hook and an optional analytic gradient `∇ℓ(θ)`.
//! - [`maximize`] validates the start, wraps the model in
//!   [`adapter::ArgMinAdapter`] (cost `c(θ) = −ℓ(θ)`) and runs L-BFGS with the
//!   line search chosen in [`MLEOptions`].
//! - [`finite_diff`] supplies the central/forward gradient used when no
//!   analytic gradient exists and the symmetrized Hessian of a gradient map.
//!
//! Invariants & assumptions
//! ------------------------
//! - Models never see the cost: values and gradients are always in
//!   log-likelihood terms and the adapter flips signs.
//! - Parameter vectors, gradients and Hessians are finite whenever a result
//!   is returned; anything else becomes an [`OptError`].
//!
//! Conventions
//! -----------
//! - Vectors and matrices use the aliases in [`types`].
//! - Errors are [`OptResult<T>`]; Argmin errors stop at the adapter and
//!   solver boundary.
//!
//! Testing notes
//! -------------
//! - [`solver`] tests maximize closed-form objectives with both line
//!   searches; [`finite_diff`] tests cover the fallback paths.
//! - The membership tests in `mixture::models` run [`maximize`] on a real
//!   weighted logit, including the numerical-gradient path.
//!
//! [`OptError`]: crate::optimization::errors::OptError
//! [`OptResult<T>`]: crate::optimization::errors::OptResult

pub mod adapter;
pub mod finite_diff;
pub mod solver;
pub mod traits;
pub mod types;
pub mod validation;

pub use self::solver::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, Grad, Hessian, Theta};

pub mod prelude {
    pub use super::solver::maximize;
    pub use super::traits::{LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
