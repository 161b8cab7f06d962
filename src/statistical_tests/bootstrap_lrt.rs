//! statistical_tests::bootstrap_lrt — parametric bootstrap likelihood-ratio test.
//!
//! Purpose
//! -------
//! Calibrate `LR = 2(LL_alt − LL_null)` by simulation from the fitted null
//! model instead of an asymptotic reference.
//!
//! Key behaviors
//! -------------
//! - Draw `b` simulates a data set from the null model's canonical
//!   parameters with the template's `n`, covariates and missing-data
//!   pattern, then refits both class counts with their own seeded start
//!   budgets ([`BootstrapOptions::starts`]).
//! - `p = #{b : LR_b ≥ LR_observed} / completed`.
//! - Draws run in parallel on the pool sized by `BootstrapOptions::workers`;
//!   results are collected in draw order, so the outcome does not depend
//!   on the number of workers.
//! - The [`RunControl`] is checked before each draw; draws that are stopped
//!   are not counted and the outcome records the stop reason.
//!
//! Invariants & assumptions
//! ------------------------
//! - Seeds are derived from `(seed, draw, stream)` only.
//! - Failed draws (simulation or refit errors) are excluded from the
//!   p-value and counted in [`BootstrapOutcome::failed`].
//!
//! Conventions
//! -----------
//! - `warn` per failed draw, `info` for the summary.
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{
    mixture::{
        core::{
            control::{RunControl, StopReason, run_in_pool},
            data::MixtureData,
            options::{FitOptions, StartOptions},
        },
        errors::{MixtureError, MixtureResult},
        models::mixture::MixtureModel,
    },
    statistical_tests::errors::{TestError, TestResult},
};

/// Bootstrap budget.
///
/// Defaults: 20 draws; per refit 10 initial starts with 2 final starts;
/// seed 0; rayon's global pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapOptions {
    pub draws: usize,
    /// Start budget of every refit; its seed is replaced per draw.
    pub starts: StartOptions,
    pub seed: u64,
    pub workers: Option<usize>,
}

impl BootstrapOptions {
    pub fn new(
        draws: usize, starts: StartOptions, seed: u64, workers: Option<usize>,
    ) -> TestResult<Self> {
        if draws == 0 {
            return Err(TestError::InvalidDraws { draws });
        }
        if workers == Some(0) {
            return Err(MixtureError::InvalidOption {
                name: "workers",
                reason: "worker count must be at least 1.",
            }
            .into());
        }
        Ok(BootstrapOptions { draws, starts, seed, workers })
    }
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        let starts =
            StartOptions { initial_starts: 10, final_starts: 2, ..StartOptions::default() };
        BootstrapOptions { draws: 20, starts, seed: 0, workers: None }
    }
}

/// Outcome of one bootstrap comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOutcome {
    null_classes: usize,
    alt_classes: usize,
    observed_lr: f64,
    stats: Vec<f64>,
    requested: usize,
    failed: usize,
    p_value: f64,
    stopped: Option<StopReason>,
}

enum Draw {
    Done(f64),
    Failed,
    Stopped(StopReason),
}

impl BootstrapOutcome {
    /// Run the bootstrap test of `null` against `alt` fitted on `data`.
    ///
    /// # Errors
    /// - `Mixture(ModelNotFitted)` when either model is unfitted.
    /// - `NotNested` unless `alt` has more classes than `null`.
    /// - `NoBootstrapDraws` when no draw completed.
    pub fn bootstrap_lrt(
        null: &MixtureModel, alt: &MixtureModel, data: &MixtureData, opts: &BootstrapOptions,
        control: &RunControl,
    ) -> TestResult<Self> {
        let r_null = null.result()?;
        let r_alt = alt.result()?;
        if r_alt.n_classes <= r_null.n_classes {
            return Err(TestError::NotNested { null_k: r_null.n_classes, alt_k: r_alt.n_classes });
        }
        let observed_lr = (2.0 * (r_alt.loglik - r_null.loglik)).max(0.0);

        let draws: Vec<Draw> = run_in_pool(opts.workers, || {
            (0..opts.draws)
                .into_par_iter()
                .map(|b| run_draw(b, null, alt, data, opts, control))
                .collect()
        })?;

        let mut stats = Vec::with_capacity(opts.draws);
        let mut failed = 0usize;
        let mut stopped = None;
        for draw in draws {
            match draw {
                Draw::Done(lr) => stats.push(lr),
                Draw::Failed => failed += 1,
                Draw::Stopped(reason) => stopped = stopped.or(Some(reason)),
            }
        }
        if stats.is_empty() {
            return Err(TestError::NoBootstrapDraws { requested: opts.draws });
        }
        let exceed = stats.iter().filter(|&&lr| lr >= observed_lr).count();
        let p_value = exceed as f64 / stats.len() as f64;
        info!(
            null_k = r_null.n_classes,
            alt_k = r_alt.n_classes,
            observed_lr,
            completed = stats.len(),
            failed,
            p_value,
            "bootstrap LRT finished"
        );

        Ok(BootstrapOutcome {
            null_classes: r_null.n_classes,
            alt_classes: r_alt.n_classes,
            observed_lr,
            stats,
            requested: opts.draws,
            failed,
            p_value,
            stopped,
        })
    }

    pub fn null_classes(&self) -> usize {
        self.null_classes
    }

    pub fn alt_classes(&self) -> usize {
        self.alt_classes
    }

    pub fn observed_lr(&self) -> f64 {
        self.observed_lr
    }

    /// Bootstrap LR statistics of completed draws, in draw order.
    pub fn stats(&self) -> &[f64] {
        &self.stats
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn completed(&self) -> usize {
        self.stats.len()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    /// Set when cancellation or a deadline skipped some draws.
    pub fn stopped(&self) -> Option<StopReason> {
        self.stopped
    }
}

fn run_draw(
    b: usize, null: &MixtureModel, alt: &MixtureModel, data: &MixtureData,
    opts: &BootstrapOptions, control: &RunControl,
) -> Draw {
    if let Some(reason) = control.check() {
        return Draw::Stopped(reason);
    }
    match refit_pair(b, null, alt, data, opts, control) {
        Ok(Ok(lr)) => Draw::Done(lr),
        Ok(Err(reason)) => Draw::Stopped(reason),
        Err(e) => {
            warn!(draw = b, error = %e, "bootstrap draw failed");
            Draw::Failed
        }
    }
}

/// Simulate from the null and refit both class counts.
///
/// The inner `Err(reason)` reports a fit cut short by `control`.
fn refit_pair(
    b: usize, null: &MixtureModel, alt: &MixtureModel, data: &MixtureData,
    opts: &BootstrapOptions, control: &RunControl,
) -> MixtureResult<Result<f64, StopReason>> {
    let simulated = null.simulate(data, draw_seed(opts.seed, b, 0))?;
    let mut lls = [0.0; 2];
    for (slot, (template, stream)) in [(null, 1u64), (alt, 2u64)].into_iter().enumerate() {
        let fit_opts = FitOptions {
            starts: opts.starts.with_seed(draw_seed(opts.seed, b, stream)),
            workers: None,
            ..template.options.clone()
        };
        let mut model = MixtureModel::new(template.shape, fit_opts);
        lls[slot] = model.fit_with_control(&simulated, control)?.loglik;
        if let Some(reason) = model.stopped {
            return Ok(Err(reason));
        }
    }
    Ok(Ok((2.0 * (lls[1] - lls[0])).max(0.0)))
}

/// Seed for `stream` (0 = simulation, 1 = null refit, 2 = alternative refit)
/// of draw `b`.
fn draw_seed(seed: u64, b: usize, stream: u64) -> u64 {
    seed.wrapping_add((b as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(stream.wrapping_mul(0xBF58_476D_1CE4_E5B9))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::core::{
        data::IndicatorKind,
        shape::{MixtureShape, VarianceStructure},
    };
    use ndarray::Array2;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Option validation and seed derivation.
    // - Determinism across worker counts and the stop path.
    //
    // They intentionally DO NOT cover:
    // - Power on separated data (see the model-selection integration test).
    // -------------------------------------------------------------------------

    fn fitted_pair() -> (MixtureData, MixtureModel, MixtureModel) {
        let y: Vec<f64> = (0..40)
            .map(|i| (if i % 2 == 0 { 0.0 } else { 5.0 }) + ((i % 5) as f64 - 2.0) * 0.3)
            .collect();
        let values = Array2::from_shape_vec((40, 1), y).unwrap();
        let data = MixtureData::new(values.view(), &[IndicatorKind::Continuous], None).unwrap();
        let mut opts = FitOptions::default();
        opts.starts = StartOptions { initial_starts: 4, final_starts: 2, ..StartOptions::default() };
        let mut null =
            MixtureModel::new(MixtureShape::new(1, VarianceStructure::Equal).unwrap(), opts.clone());
        let mut alt =
            MixtureModel::new(MixtureShape::new(2, VarianceStructure::Equal).unwrap(), opts);
        null.fit(&data).unwrap();
        alt.fit(&data).unwrap();
        (data, null, alt)
    }

    #[test]
    // Purpose
    // -------
    // Validate option construction and seed streams.
    //
    // Given
    // -----
    // - Zero draws, zero workers and a few seed triples.
    //
    // Expect
    // ------
    // - `InvalidDraws`, a wrapped `InvalidOption`, and distinct seeds per
    //   draw and stream.
    fn options_and_seeds() {
        let starts = StartOptions::default();
        assert_eq!(
            BootstrapOptions::new(0, starts, 1, None),
            Err(TestError::InvalidDraws { draws: 0 })
        );
        assert!(matches!(
            BootstrapOptions::new(5, starts, 1, Some(0)),
            Err(TestError::Mixture(MixtureError::InvalidOption { name: "workers", .. }))
        ));
        assert_ne!(draw_seed(3, 0, 0), draw_seed(3, 1, 0));
        assert_ne!(draw_seed(3, 0, 1), draw_seed(3, 0, 2));
    }

    #[test]
    // Purpose
    // -------
    // Check that bootstrap statistics do not depend on the worker count.
    //
    // Given
    // -----
    // - 1- and 2-class fits on two-group data; 4 draws with 1 and 3 workers.
    //
    // Expect
    // ------
    // - Identical statistics and p-values; all draws complete; p in [0, 1].
    fn bootstrap_is_deterministic_across_workers() {
        // Arrange
        let (data, null, alt) = fitted_pair();
        let starts = StartOptions { initial_starts: 3, final_starts: 1, ..StartOptions::default() };
        let one = BootstrapOptions::new(4, starts, 9, Some(1)).unwrap();
        let three = BootstrapOptions { workers: Some(3), ..one };
        let control = RunControl::new();

        // Act
        let a = BootstrapOutcome::bootstrap_lrt(&null, &alt, &data, &one, &control).unwrap();
        let b = BootstrapOutcome::bootstrap_lrt(&null, &alt, &data, &three, &control).unwrap();

        // Assert
        assert_eq!(a.stats(), b.stats());
        assert_eq!(a.p_value(), b.p_value());
        assert_eq!(a.completed() + a.failed(), 4);
        assert!((0.0..=1.0).contains(&a.p_value()));
        assert!(a.observed_lr() > 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Ensure a cancelled run reports no completed draws.
    //
    // Given
    // -----
    // - A control cancelled before the test starts.
    //
    // Expect
    // ------
    // - `NoBootstrapDraws { requested: 3 }`; swapping the models gives
    //   `NotNested`.
    fn cancelled_run_has_no_draws() {
        let (data, null, alt) = fitted_pair();
        let opts = BootstrapOptions { draws: 3, ..BootstrapOptions::default() };
        let control = RunControl::new();
        control.cancel();
        assert_eq!(
            BootstrapOutcome::bootstrap_lrt(&null, &alt, &data, &opts, &control),
            Err(TestError::NoBootstrapDraws { requested: 3 })
        );
        assert!(matches!(
            BootstrapOutcome::bootstrap_lrt(&alt, &null, &data, &opts, &RunControl::new()),
            Err(TestError::NotNested { null_k: 2, alt_k: 1 })
        ));
    }
}
