//! Mixture options — configuration for EM, random starts and fitting.
//!
//! Purpose
//! -------
//! Collect every estimation knob in plain, validated option structs so a fit
//! is fully described by `(data, shape, FitOptions)` and is reproducible
//! from its seed.
//!
//! Key behaviors
//! -------------
//! - [`EMTolerances`]: absolute and relative log-likelihood change criteria
//!   plus the iteration cap.
//! - [`EMOptions`]: tolerances plus the inner [`MLEOptions`] used for the
//!   covariate membership step.
//! - [`StartOptions`]: two-stage random-start budget, seed, perturbation
//!   scale and base-start policy ([`BaseStart`]).
//! - [`FitOptions`]: everything above plus the replication tolerance and the
//!   worker count.
//!
//! Invariants & assumptions
//! ------------------------
//! - Tolerances are finite and strictly positive; iteration caps are ≥ 1.
//! - `final_starts ≥ 1`; a stage-2 budget larger than the stage-1 budget is
//!   clamped at run time to the number of available starts.
//! - `workers = Some(0)` is rejected; `None` uses rayon's global pool.
//!
//! Conventions
//! -----------
//! - `Default` implementations use struct literals with the documented
//!   defaults and never panic.
//! - `new` constructors validate and return `MixtureResult<Self>`.
//!
//! Testing notes
//! -------------
//! - Unit tests check documented defaults and each rejection path.
use crate::{
    mixture::errors::{MixtureError, MixtureResult},
    optimization::loglik_optimizer::{MLEOptions, Tolerances, traits::LineSearcher},
};

fn check_tol(name: &'static str, value: f64) -> MixtureResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MixtureError::InvalidTolerance {
            name,
            value,
            reason: "must be finite and strictly positive.",
        });
    }
    Ok(())
}

/// EM convergence criteria.
///
/// Converged when **both** `|ΔLL| < loglik_abs` and
/// `|ΔLL| / |LL_prev| < loglik_rel`. Defaults: `1e-7`, `1e-7`, `500`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EMTolerances {
    pub loglik_abs: f64,
    pub loglik_rel: f64,
    pub max_iter: usize,
}

impl EMTolerances {
    pub fn new(loglik_abs: f64, loglik_rel: f64, max_iter: usize) -> MixtureResult<Self> {
        check_tol("loglik_abs", loglik_abs)?;
        check_tol("loglik_rel", loglik_rel)?;
        if max_iter == 0 {
            return Err(MixtureError::InvalidOption {
                name: "max_iter",
                reason: "must be at least 1.",
            });
        }
        Ok(EMTolerances { loglik_abs, loglik_rel, max_iter })
    }

    /// Whether a change from `prev` to `curr` meets both criteria.
    pub fn is_converged(&self, prev: f64, curr: f64) -> bool {
        let delta = (curr - prev).abs();
        let rel = if prev != 0.0 { delta / prev.abs() } else { delta };
        delta < self.loglik_abs && rel < self.loglik_rel
    }
}

impl Default for EMTolerances {
    fn default() -> Self {
        EMTolerances { loglik_abs: 1e-7, loglik_rel: 1e-7, max_iter: 500 }
    }
}

/// EM configuration: convergence criteria and the inner membership optimizer.
///
/// `membership` is only used when covariates are present. Its default is
/// L-BFGS with More–Thuente line search, `tol_grad = 1e-6` and at most 100
/// iterations per M-step.
#[derive(Debug, Clone, PartialEq)]
pub struct EMOptions {
    pub tols: EMTolerances,
    pub membership: MLEOptions,
}

impl EMOptions {
    pub fn new(tols: EMTolerances, membership: MLEOptions) -> Self {
        EMOptions { tols, membership }
    }
}

impl Default for EMOptions {
    fn default() -> Self {
        EMOptions {
            tols: EMTolerances::default(),
            membership: MLEOptions {
                tols: Tolerances { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(100) },
                line_searcher: LineSearcher::MoreThuente,
                verbose: false,
                lbfgs_mem: None,
            },
        }
    }
}

/// Deterministic base start used as start 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseStart {
    /// Class means spread symmetrically around the sample mean, thresholds
    /// shifted on the logit scale, equal proportions.
    #[default]
    Unperturbed,
    /// k-means on standardized complete cases; falls back to Ward
    /// clustering on mean-imputed data, then to [`BaseStart::Unperturbed`].
    Clustering,
}

/// Random-start budget and seeding.
///
/// Defaults: 20 initial starts run for 10 EM iterations, best 4 continue to
/// convergence, seed 0, perturbation scale 1.0, unperturbed base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartOptions {
    /// Number of stage-1 starts; 0 runs only the base start.
    pub initial_starts: usize,
    /// Number of stage-1 starts continued to full convergence.
    pub final_starts: usize,
    /// EM iterations per stage-1 start.
    pub initial_iterations: usize,
    /// Base seed; start `i ≥ 1` uses `seed + i`.
    pub seed: u64,
    /// Scale of random perturbations in units of the indicator SD (means) or
    /// on the logit scale (thresholds).
    pub perturbation: f64,
    pub base: BaseStart,
}

impl StartOptions {
    pub fn new(
        initial_starts: usize, final_starts: usize, initial_iterations: usize, seed: u64,
        perturbation: f64, base: BaseStart,
    ) -> MixtureResult<Self> {
        if final_starts == 0 {
            return Err(MixtureError::InvalidOption {
                name: "final_starts",
                reason: "at least one start must proceed to the final stage.",
            });
        }
        if initial_iterations == 0 {
            return Err(MixtureError::InvalidOption {
                name: "initial_iterations",
                reason: "must be at least 1.",
            });
        }
        check_tol("perturbation", perturbation)?;
        Ok(StartOptions { initial_starts, final_starts, initial_iterations, seed, perturbation, base })
    }

    /// Same budget with a different base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for StartOptions {
    fn default() -> Self {
        StartOptions {
            initial_starts: 20,
            final_starts: 4,
            initial_iterations: 10,
            seed: 0,
            perturbation: 1.0,
            base: BaseStart::Unperturbed,
        }
    }
}

/// Complete fitting configuration for one class count.
///
/// Defaults: [`EMOptions::default`], [`StartOptions::default`],
/// `replication_tol = 1e-3` (absolute log-likelihood difference),
/// `workers = None` (rayon's global pool).
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub em: EMOptions,
    pub starts: StartOptions,
    pub replication_tol: f64,
    pub workers: Option<usize>,
}

impl FitOptions {
    pub fn new(
        em: EMOptions, starts: StartOptions, replication_tol: f64, workers: Option<usize>,
    ) -> MixtureResult<Self> {
        check_tol("replication_tol", replication_tol)?;
        if workers == Some(0) {
            return Err(MixtureError::InvalidOption {
                name: "workers",
                reason: "worker count must be at least 1.",
            });
        }
        Ok(FitOptions { em, starts, replication_tol, workers })
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            em: EMOptions::default(),
            starts: StartOptions::default(),
            replication_tol: 1e-3,
            workers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Documented defaults.
    // - Rejection of invalid tolerances, budgets and worker counts.
    // - The two-part EM convergence rule.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify documented defaults.
    //
    // Given
    // -----
    // - `FitOptions::default()`.
    //
    // Expect
    // ------
    // - 1e-7 / 1e-7 / 500 EM criteria, 20 / 4 / 10 starts, seed 0,
    //   replication tolerance 1e-3, no explicit worker count.
    fn defaults_match_documentation() {
        let opts = FitOptions::default();
        assert_eq!(opts.em.tols, EMTolerances { loglik_abs: 1e-7, loglik_rel: 1e-7, max_iter: 500 });
        assert_eq!(opts.starts.initial_starts, 20);
        assert_eq!(opts.starts.final_starts, 4);
        assert_eq!(opts.starts.initial_iterations, 10);
        assert_eq!(opts.starts.seed, 0);
        assert_eq!(opts.starts.base, BaseStart::Unperturbed);
        assert_eq!(opts.replication_tol, 1e-3);
        assert_eq!(opts.workers, None);
        assert_eq!(opts.em.membership.tols.max_iter, Some(100));
    }

    #[test]
    // Purpose
    // -------
    // Ensure invalid option values are rejected with typed errors.
    //
    // Given
    // -----
    // - A negative tolerance, a zero iteration cap, zero final starts and
    //   zero workers.
    //
    // Expect
    // ------
    // - `InvalidTolerance` or `InvalidOption` for each.
    fn constructors_reject_invalid_values() {
        assert!(matches!(
            EMTolerances::new(-1.0, 1e-7, 10),
            Err(MixtureError::InvalidTolerance { name: "loglik_abs", .. })
        ));
        assert!(matches!(
            EMTolerances::new(1e-7, 1e-7, 0),
            Err(MixtureError::InvalidOption { name: "max_iter", .. })
        ));
        assert!(matches!(
            StartOptions::new(10, 0, 5, 1, 1.0, BaseStart::Unperturbed),
            Err(MixtureError::InvalidOption { name: "final_starts", .. })
        ));
        assert!(matches!(
            FitOptions::new(EMOptions::default(), StartOptions::default(), 1e-3, Some(0)),
            Err(MixtureError::InvalidOption { name: "workers", .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify that convergence needs both the absolute and relative criteria.
    //
    // Given
    // -----
    // - Tolerances 1e-3 absolute and 1e-9 relative.
    //
    // Expect
    // ------
    // - A change of 1e-4 at LL = −10 fails the relative rule.
    // - A change of 1e-12 passes both.
    fn is_converged_requires_both_criteria() {
        let tols = EMTolerances::new(1e-3, 1e-9, 10).unwrap();
        assert!(!tols.is_converged(-10.0, -10.0 + 1e-4));
        assert!(tols.is_converged(-10.0, -10.0 + 1e-12));
    }
}
