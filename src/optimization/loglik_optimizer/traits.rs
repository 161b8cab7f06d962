//! Model trait, solver configuration and normalized outcome.
//!
//! A caller maximizes `ℓ(θ)`; the solver internally minimizes `−ℓ(θ)`.
//! Analytic gradients, when supplied, are gradients of `ℓ`.
use std::str::FromStr;

use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{Cost, Grad, Theta},
        validation::{validate_theta_hat, validate_value, verify_tol},
    },
};

/// A log-likelihood over an unconstrained parameter vector.
///
/// - `value` evaluates `ℓ(θ)`; invalid inputs are errors, not panics.
/// - `check` runs once on the starting point before any iteration.
/// - `grad` returns `∇ℓ(θ)`; the default reports
///   [`OptError::GradientNotImplemented`] and the adapter falls back to
///   finite differences of the cost.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search used inside L-BFGS. Parses case-insensitively from
/// `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Stopping rules for one L-BFGS run. At least one must be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Stop once `‖∇c(θ)‖` falls below this value.
    pub tol_grad: Option<f64>,
    /// Stop once the cost change falls below this value.
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// # Errors
    /// - `NoTolerancesProvided` when every rule is `None`.
    /// - `InvalidTolGrad` / `InvalidTolCost` for non-finite or non-positive
    ///   tolerances; `InvalidMaxIter` for a zero cap.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        if let Some(tol) = tol_grad {
            verify_tol(tol).map_err(|reason| OptError::InvalidTolGrad { tol, reason })?;
        }
        if let Some(tol) = tol_cost {
            verify_tol(tol).map_err(|reason| OptError::InvalidTolCost { tol, reason })?;
        }
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Tolerances { tol_grad, tol_cost, max_iter })
    }
}

/// Solver configuration.
///
/// Default: `tol_grad = 1e-6`, no cost rule, 300 iterations, More–Thuente,
/// quiet, L-BFGS memory [`DEFAULT_LBFGS_MEM`](super::types::DEFAULT_LBFGS_MEM).
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    /// Attach a terminal observer when built with `obs_slog`.
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// # Errors
    /// - `InvalidLBFGSMem` for a zero history length.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(MLEOptions { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        MLEOptions {
            tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(300) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Result of [`maximize`](super::maximize), in log-likelihood terms.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    /// `ℓ(θ̂)`, not the cost.
    pub value: f64,
    /// `false` only when the solver stopped without a termination status.
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    /// `‖∇c(θ̂)‖` when the last gradient is available.
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Validate raw solver state into an outcome.
    ///
    /// # Errors
    /// - `MissingThetaHat` / `InvalidThetaHat` for an absent or non-finite
    ///   best parameter; `NonFiniteCost` for a non-finite value.
    pub fn new(
        theta_hat: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        Ok(OptimOutcome {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::TerminationReason;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Tolerance and option validation.
    // - Line-search parsing.
    // - Outcome construction from solver state.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Reject empty or invalid stopping rules and a zero L-BFGS memory.
    //
    // Given
    // -----
    // - All-`None` tolerances, a negative gradient tolerance, a zero
    //   iteration cap and zero memory.
    //
    // Expect
    // ------
    // - The matching `OptError` variant for each.
    fn options_validation() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(Some(-1.0), None, None),
            Err(OptError::InvalidTolGrad { .. })
        ));
        assert!(matches!(
            Tolerances::new(None, Some(f64::NAN), None),
            Err(OptError::InvalidTolCost { .. })
        ));
        assert!(matches!(Tolerances::new(None, None, Some(0)), Err(OptError::InvalidMaxIter { .. })));
        let tols = Tolerances::new(Some(1e-6), None, Some(50)).unwrap();
        assert!(matches!(
            MLEOptions::new(tols, LineSearcher::HagerZhang, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Parse line-search names regardless of case.
    //
    // Given
    // -----
    // - "hagerZHANG", "MoreThuente" and "newton".
    //
    // Expect
    // ------
    // - The two variants and `InvalidLineSearch`.
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("hagerZHANG".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert_eq!("MoreThuente".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert!(matches!(
            "newton".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Map termination status and validate the best parameter.
    //
    // Given
    // -----
    // - A terminated state with gradient (3, 4); an unterminated state; a
    //   missing parameter.
    //
    // Expect
    // ------
    // - Converged with gradient norm 5; not converged; `MissingThetaHat`.
    fn outcome_from_solver_state() {
        let done = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        let out = OptimOutcome::new(Some(array![1.0]), -2.0, done, 7, Some(array![3.0, 4.0]))
            .unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 7);
        assert_eq!(out.grad_norm, Some(5.0));

        let open =
            OptimOutcome::new(Some(array![1.0]), -2.0, TerminationStatus::NotTerminated, 1, None)
                .unwrap();
        assert!(!open.converged);
        assert_eq!(
            OptimOutcome::new(None, 0.0, TerminationStatus::NotTerminated, 0, None),
            Err(OptError::MissingThetaHat)
        );
    }
}
