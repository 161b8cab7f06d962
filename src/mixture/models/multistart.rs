//! Two-stage random-start search and reduction to one solution.
//!
//! Purpose
//! -------
//! Explore the start list of one class count in parallel and reduce the
//! per-start outcomes to a single canonical EM solution with a replication
//! verdict.
//!
//! Key behaviors
//! -------------
//! - Stage 1: every start runs `initial_iterations` EM iterations.
//! - Stage 2: the best `final_starts` by stage-1 log-likelihood (ties to the
//!   lowest start index) continue from their stage-1 parameters for up to
//!   `EMTolerances::max_iter` iterations. With a single start, stage 1 is
//!   skipped.
//! - Reduction: maximum log-likelihood over converged stage-2 starts, lowest
//!   start index on ties; if none converged, the best non-converged start.
//! - Replication: at least two converged stage-2 starts within
//!   `replication_tol` of the best log-likelihood. K = 1 (one start, unique
//!   optimum) counts as replicated.
//!
//! Invariants & assumptions
//! ------------------------
//! - Each worker owns its start's parameters and buffers; outcomes are
//!   collected in start order before any reduction, so the result does not
//!   depend on scheduling.
//! - Failed starts (numerical errors) are logged and excluded; if all fail
//!   the search returns `AllStartsFailed`.
//!
//! Conventions
//! -----------
//! - `debug` per stage, `warn` for failed starts, non-convergence and
//!   unreplicated optima.
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::mixture::{
    core::{
        control::{RunControl, StopReason, run_in_pool},
        data::MixtureData,
        init::{RandomStart, generate_starts},
        options::FitOptions,
        params::MixtureParams,
        shape::MixtureShape,
    },
    errors::{MixtureError, MixtureResult},
    models::em::{EMOutcome, EMStatus, run_em},
};

/// What happened to one start across both stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSummary {
    pub index: usize,
    pub seed: Option<u64>,
    /// Stage-1 log-likelihood (`None` if stage 1 failed or was skipped).
    pub initial_loglik: Option<f64>,
    /// Stage-2 log-likelihood (`None` if the start was not continued or
    /// failed).
    pub final_loglik: Option<f64>,
    /// Stage-2 status, when the start was continued.
    pub status: Option<EMStatus>,
    /// Total EM iterations across both stages.
    pub iterations: usize,
    /// Error text for failed starts.
    pub error: Option<String>,
}

/// Outcome of the start search for one class count.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSearch {
    pub best: EMOutcome,
    pub best_index: usize,
    pub best_seed: Option<u64>,
    /// Per-start summaries in start order.
    pub summaries: Vec<StartSummary>,
    pub replicated: bool,
    /// Converged stage-2 starts within the replication tolerance of the best.
    pub replication_count: usize,
    /// Set when cancellation or a deadline cut the search short.
    pub stopped: Option<StopReason>,
}

/// Run the start search on the pool sized by `opts.workers`.
///
/// # Errors
/// - `InvalidClassCount` when K is not below the number of observations.
/// - `AllStartsFailed` when every start errors.
/// - `ThreadPool` when a dedicated pool cannot be built.
pub fn search_starts(
    data: &MixtureData, shape: &MixtureShape, opts: &FitOptions, control: &RunControl,
) -> MixtureResult<StartSearch> {
    shape.check_data(data)?;
    let starts = generate_starts(data, shape, &opts.starts)?;
    run_in_pool(opts.workers, || search_in_current_pool(starts, data, shape, opts, control))?
}

fn search_in_current_pool(
    starts: Vec<RandomStart>, data: &MixtureData, shape: &MixtureShape, opts: &FitOptions,
    control: &RunControl,
) -> MixtureResult<StartSearch> {
    let k = shape.n_classes;
    let n_starts = starts.len();
    let mut summaries: Vec<StartSummary> = starts
        .iter()
        .map(|s| StartSummary {
            index: s.index,
            seed: s.seed,
            initial_loglik: None,
            final_loglik: None,
            status: None,
            iterations: 0,
            error: None,
        })
        .collect();

    // ---- Stage 1 ----
    let candidates: Vec<(usize, MixtureResult<Stage1>)> = if n_starts == 1 {
        starts
            .into_iter()
            .map(|s| {
                let stage1 = Stage1 { params: s.params, loglik: f64::NEG_INFINITY, iterations: 0 };
                (s.index, Ok(stage1))
            })
            .collect()
    } else {
        starts
            .into_par_iter()
            .map(|s| {
                let out = run_em(
                    s.params,
                    data,
                    shape,
                    &opts.em,
                    opts.starts.initial_iterations,
                    control,
                )
                .map(|o| Stage1 { params: o.params, loglik: o.loglik, iterations: o.iterations });
                (s.index, out)
            })
            .collect()
    };

    let mut survivors: Vec<(usize, Stage1)> = Vec::with_capacity(n_starts);
    for (index, res) in candidates {
        match res {
            Ok(stage1) => {
                if n_starts > 1 {
                    summaries[index].initial_loglik = Some(stage1.loglik);
                    summaries[index].iterations = stage1.iterations;
                }
                survivors.push((index, stage1));
            }
            Err(e) => {
                warn!(n_classes = k, start = index, error = %e, "start failed in initial stage");
                summaries[index].error = Some(e.to_string());
            }
        }
    }
    debug!(n_classes = k, starts = n_starts, survivors = survivors.len(), "initial stage finished");

    survivors.sort_by(|(ia, a), (ib, b)| b.loglik.total_cmp(&a.loglik).then(ia.cmp(ib)));
    survivors.truncate(opts.starts.final_starts.min(survivors.len()));

    // ---- Stage 2 ----
    let finals: Vec<(usize, MixtureResult<EMOutcome>)> = survivors
        .into_par_iter()
        .map(|(index, stage1)| {
            let done = stage1.iterations;
            let res = run_em(stage1.params, data, shape, &opts.em, opts.em.tols.max_iter, control)
                .map(|mut fin| {
                    fin.iterations += done;
                    fin
                });
            (index, res)
        })
        .collect();

    let mut finished: Vec<(usize, EMOutcome)> = Vec::with_capacity(finals.len());
    for (index, res) in finals {
        match res {
            Ok(out) => {
                summaries[index].final_loglik = Some(out.loglik);
                summaries[index].status = Some(out.status);
                summaries[index].iterations = out.iterations;
                finished.push((index, out));
            }
            Err(e) => {
                warn!(n_classes = k, start = index, error = %e, "start failed in final stage");
                summaries[index].error = Some(e.to_string());
            }
        }
    }
    debug!(n_classes = k, finished = finished.len(), "final stage finished");

    reduce(finished, summaries, n_starts, k, opts.replication_tol, control)
}

/// Parameters carried from stage 1 into stage 2.
struct Stage1 {
    params: MixtureParams,
    loglik: f64,
    iterations: usize,
}

fn reduce(
    mut finished: Vec<(usize, EMOutcome)>, summaries: Vec<StartSummary>, n_starts: usize, k: usize,
    replication_tol: f64, control: &RunControl,
) -> MixtureResult<StartSearch> {
    if finished.is_empty() {
        return Err(MixtureError::AllStartsFailed { attempted: n_starts });
    }
    finished.sort_by_key(|(index, _)| *index);

    let pick = |only_converged: bool| {
        let mut best: Option<usize> = None;
        for (pos, (_, out)) in finished.iter().enumerate() {
            if only_converged && !out.converged() {
                continue;
            }
            match best {
                Some(b) if finished[b].1.loglik >= out.loglik => {}
                _ => best = Some(pos),
            }
        }
        best
    };
    let any_converged = finished.iter().any(|(_, o)| o.converged());
    let best_pos = match pick(true).or_else(|| pick(false)) {
        Some(pos) => pos,
        None => return Err(MixtureError::AllStartsFailed { attempted: n_starts }),
    };
    if !any_converged {
        warn!(n_classes = k, "no start converged; keeping the best non-converged solution");
    }

    let best_ll = finished[best_pos].1.loglik;
    let replication_count = finished
        .iter()
        .filter(|(_, o)| o.converged() && (o.loglik - best_ll).abs() <= replication_tol)
        .count();
    let replicated = if k == 1 { any_converged } else { replication_count >= 2 };
    if !replicated {
        warn!(
            n_classes = k,
            loglik = best_ll,
            replication_count,
            "best log-likelihood not replicated; consider more random starts"
        );
    }

    let stopped = control.check();
    let (best_index, best) = finished.swap_remove(best_pos);
    let best_seed = summaries[best_index].seed;
    Ok(StartSearch {
        best,
        best_index,
        best_seed,
        summaries,
        replicated,
        replication_count,
        stopped,
    })
}
