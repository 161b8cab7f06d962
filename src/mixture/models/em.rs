//! EM iterations for one start.
//!
//! Purpose
//! -------
//! Alternate the E-step and the M-step from a single starting point until
//! the log-likelihood change meets [`EMTolerances`](crate::mixture::core::options::EMTolerances),
//! the iteration cap is reached, or the [`RunControl`] asks to stop.
//!
//! Key behaviors
//! -------------
//! - One `n × K` posterior buffer is reused across iterations.
//! - M-step: closed-form indicator updates; class proportions in closed form
//!   without covariates, otherwise the inner multinomial-logit step of
//!   [`membership`](super::membership).
//! - The log-likelihood after every iteration is recorded in
//!   [`EMOutcome::trace`], which is non-decreasing up to floating-point
//!   noise.
//!
//! Invariants & assumptions
//! ------------------------
//! - The start parameters match the data layout and `shape`.
//! - The returned posterior corresponds exactly to the returned parameters.
//!
//! Conventions
//! -----------
//! - Hitting the iteration cap is a status (`MaxIterations`), not an error;
//!   numerical breakdown (non-finite log-likelihood) is an error.
//! - This module does not log; callers report per-start outcomes.
use ndarray::Array2;

use crate::mixture::{
    core::{
        control::{RunControl, StopReason},
        data::MixtureData,
        mstep::{proportion_logits, update_indicators},
        options::EMOptions,
        params::MixtureParams,
        posterior::{PosteriorMatrix, e_step},
        shape::MixtureShape,
    },
    errors::{MixtureError, MixtureResult},
    models::membership::{MembershipData, update_membership},
};

/// How an EM run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EMStatus {
    Converged,
    MaxIterations,
    Cancelled,
    DeadlineExceeded,
}

impl From<StopReason> for EMStatus {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Cancelled => EMStatus::Cancelled,
            StopReason::DeadlineExceeded => EMStatus::DeadlineExceeded,
        }
    }
}

/// Result of one EM run.
#[derive(Debug, Clone, PartialEq)]
pub struct EMOutcome {
    pub params: MixtureParams,
    pub posterior: PosteriorMatrix,
    pub loglik: f64,
    /// Completed EM iterations.
    pub iterations: usize,
    pub status: EMStatus,
    /// Log-likelihood at the start and after each iteration.
    pub trace: Vec<f64>,
    /// Inner membership steps whose optimizer failed (covariate models only).
    pub membership_failures: usize,
}

impl EMOutcome {
    pub fn converged(&self) -> bool {
        self.status == EMStatus::Converged
    }
}

/// Run at most `max_iter` EM iterations from `start`.
///
/// # Errors
/// - `LayoutMismatch` when `start` does not fit `data` or `shape`.
/// - `NonFiniteLogLik` when an E-step breaks down.
pub fn run_em(
    start: MixtureParams, data: &MixtureData, shape: &MixtureShape, opts: &EMOptions,
    max_iter: usize, control: &RunControl,
) -> MixtureResult<EMOutcome> {
    start.check_layout(data)?;
    if start.n_classes() != shape.n_classes {
        return Err(MixtureError::LayoutMismatch {
            reason: "start parameters and shape disagree on K",
        });
    }
    let width = 1 + data.n_covariates();
    let mut params = start;
    let mut post = Array2::<f64>::zeros((data.n_obs(), shape.n_classes));
    let mut ll = e_step(&params, data, &mut post)?;
    let mut trace = vec![ll];
    let mut membership =
        data.has_covariates().then(|| MembershipData::new(data, shape.n_classes));
    let mut membership_failures = 0usize;
    let mut iterations = 0usize;
    let mut status = EMStatus::MaxIterations;

    for iter in 1..=max_iter {
        if let Some(reason) = control.check() {
            status = reason.into();
            break;
        }
        let indicators = update_indicators(post.view(), data, shape)?;
        let logits = match membership.as_mut() {
            None => proportion_logits(post.view(), width),
            Some(md) => {
                md.weights.assign(&post);
                let (logits, ok) = update_membership(&params.logits, md, &opts.membership);
                if !ok {
                    membership_failures += 1;
                }
                logits
            }
        };
        params = MixtureParams::new(logits, indicators)?;
        let prev = ll;
        ll = e_step(&params, data, &mut post)?;
        trace.push(ll);
        iterations = iter;
        if opts.tols.is_converged(prev, ll) {
            status = EMStatus::Converged;
            break;
        }
    }

    Ok(EMOutcome {
        params,
        posterior: PosteriorMatrix::from_e_step(post),
        loglik: ll,
        iterations,
        status,
        trace,
        membership_failures,
    })
}
