//! L-BFGS driver: build the solver, run it, normalize the outcome.
//!
//! [`maximize`] is the only entry point. The line search comes from
//! [`MLEOptions::line_searcher`]; tolerances go to the solver and the
//! iteration cap to the executor. With the `obs_slog` feature and
//! `verbose = true`, a terminal observer reports every iteration.
use argmin::{
    core::{Executor, IterState, Solver, State},
    solver::quasinewton::LBFGS,
};
use tracing::trace;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome},
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};

/// Maximize `f` from `theta0`.
///
/// # Errors
/// - Whatever `f.check` rejects at the start.
/// - Invalid tolerances rejected by Argmin.
/// - Model errors raised during the run, returned unchanged, and
///   line-search failures.
/// - `InvalidThetaHat` / `NonFiniteCost` for a non-finite solution.
///
/// # Example
/// ```
/// use ndarray::array;
/// use rust_mixture::optimization::{
///     errors::OptResult,
///     loglik_optimizer::{maximize, LogLikelihood, MLEOptions, Theta},
/// };
///
/// struct Bowl;
/// impl LogLikelihood for Bowl {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-(theta[0] - 2.0).powi(2))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Bowl, array![0.0], &(), &MLEOptions::default())?;
/// assert!((out.theta_hat[0] - 2.0).abs() < 1e-4);
/// # Ok::<(), rust_mixture::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver: LbfgsMoreThuente =
                with_tolerances(LBFGS::new(MoreThuenteLS::new(), mem), opts)?;
            run(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver: LbfgsHagerZhang =
                with_tolerances(LBFGS::new(HagerZhangLS::new(), mem), opts)?;
            run(theta0, opts, problem, solver)
        }
    }
}

fn with_tolerances<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

fn run<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    trace!(dim = theta0.len(), "starting L-BFGS");
    let mut executor = Executor::new(problem, solver).configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        executor = executor.configure(|state| state.max_iters(max_iter as u64));
    }
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        executor = executor.add_observer(
            argmin_observer_slog::SlogLogger::term_noblock(),
            argmin::core::observers::ObserverMode::Always,
        );
    }

    let mut state = executor.run()?.state().clone();
    let iterations = state.get_iter();
    let termination = state.get_termination_status().clone();
    let grad = state.take_gradient();
    let best = state.take_best_param();
    let outcome = OptimOutcome::new(best, -state.get_best_cost(), termination, iterations, grad)?;
    trace!(
        iterations = outcome.iterations,
        value = outcome.value,
        status = %outcome.status,
        "L-BFGS finished"
    );
    Ok(outcome)
}
