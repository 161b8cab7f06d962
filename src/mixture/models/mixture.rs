//! Fitted finite mixture model: start search, canonical labels, inference.
//!
//! [`MixtureModel`] owns the configuration of one class count and, after
//! [`MixtureModel::fit`], the canonical solution: parameters and posterior
//! relabelled so that classes are ordered by decreasing average class
//! probability (a stable sort, so tied classes keep the winning start's
//! order), plus a frozen [`FitResult`]. Standard errors and the information
//! condition number are computed on demand in the reporting
//! parameterization θ and returned together as a `ParameterTable`.
//!
//! It also implements [`LogLikelihood`] over θ, so the optimizer-layer
//! finite-difference helpers apply unchanged.
use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::{
    inference::{
        hessian::{VarianceEstimator, condition_number, covariance_from_information},
        scores::average_score_covariance,
        wald::{ParameterTable, wald_table},
    },
    mixture::{
        core::{
            control::{RunControl, StopReason},
            data::MixtureData,
            options::FitOptions,
            params::MixtureParams,
            posterior::{PosteriorMatrix, loglik},
            save::{SaveOptions, format_save},
            shape::MixtureShape,
            simulate::simulate,
            validation::validate_theta,
        },
        errors::{MixtureError, MixtureResult},
        models::{
            fit::FitResult,
            multistart::{StartSummary, search_starts},
            scores::{observation_scores, score_sum},
        },
    },
    optimization::{
        errors::OptResult,
        loglik_optimizer::{Grad, LogLikelihood, Theta, finite_diff::compute_hessian},
    },
};

/// Information condition numbers below this are logged as weak
/// identification.
const WEAK_IDENTIFICATION: f64 = 1e-10;

/// K-class mixture with its fitting options and (after `fit`) its solution.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureModel {
    /// Class count and variance structure.
    pub shape: MixtureShape,
    /// EM, start and worker settings.
    pub options: FitOptions,
    /// Summary of the canonical solution (populated after `fit`).
    pub results: Option<FitResult>,
    /// Canonical parameters (populated after `fit`).
    pub fitted_params: Option<MixtureParams>,
    /// Canonical posterior (populated after `fit`).
    pub posterior: Option<PosteriorMatrix>,
    /// Per-start outcomes of the last search, in start order.
    pub start_summaries: Vec<StartSummary>,
    /// Set when the last fit was cut short by cancellation or a deadline.
    pub stopped: Option<StopReason>,
}

impl MixtureModel {
    pub fn new(shape: MixtureShape, options: FitOptions) -> MixtureModel {
        MixtureModel {
            shape,
            options,
            results: None,
            fitted_params: None,
            posterior: None,
            start_summaries: Vec::new(),
            stopped: None,
        }
    }

    /// Fit without cancellation or deadline.
    pub fn fit(&mut self, data: &MixtureData) -> MixtureResult<&FitResult> {
        self.fit_with_control(data, &RunControl::new())
    }

    /// Fit by multi-start EM and store the canonical solution.
    ///
    /// ## Steps
    /// 1. Run the two-stage start search on the configured worker pool.
    /// 2. Order classes canonically and relabel parameters and posterior.
    /// 3. Freeze the summary statistics into a [`FitResult`].
    ///
    /// A stop request does not fail the fit: the best solution reached so
    /// far is stored with a `Cancelled` / `DeadlineExceeded` status and
    /// [`MixtureModel::stopped`] is set.
    ///
    /// ## Errors
    /// - Data / shape validation errors (e.g. `InvalidClassCount`).
    /// - `AllStartsFailed` when no start produced a solution.
    pub fn fit_with_control(
        &mut self, data: &MixtureData, control: &RunControl,
    ) -> MixtureResult<&FitResult> {
        let search = search_starts(data, &self.shape, &self.options, control)?;
        let order = search.best.params.canonical_order(data);
        let params = search.best.params.relabel(&order)?;
        let posterior = search.best.posterior.relabel(&order);
        let result = FitResult::build(&search, &params, &posterior, data, &self.shape, order);

        info!(
            k = result.n_classes,
            loglik = result.loglik,
            bic = result.bic,
            converged = result.converged,
            replicated = result.replicated,
            "mixture fitted"
        );
        if let Some(reason) = search.stopped {
            warn!(k = result.n_classes, ?reason, "start search stopped early");
        }
        debug!(start = result.start_index, iterations = result.iterations, "winning start");

        self.start_summaries = search.summaries;
        self.stopped = search.stopped;
        self.fitted_params = Some(params);
        self.posterior = Some(posterior);
        Ok(self.results.insert(result))
    }

    /// Summary of the last fit.
    pub fn result(&self) -> MixtureResult<&FitResult> {
        self.results.as_ref().ok_or(MixtureError::ModelNotFitted)
    }

    /// Canonical fitted parameters.
    pub fn params(&self) -> MixtureResult<&MixtureParams> {
        self.fitted_params.as_ref().ok_or(MixtureError::ModelNotFitted)
    }

    /// Canonical posterior class probabilities.
    pub fn posterior(&self) -> MixtureResult<&PosteriorMatrix> {
        self.posterior.as_ref().ok_or(MixtureError::ModelNotFitted)
    }

    /// Fitted parameters as a reporting vector θ.
    pub fn theta_hat(&self) -> MixtureResult<Theta> {
        Ok(self.params()?.to_theta(&self.shape))
    }

    /// Per-observation scores at the fitted parameters, `n × P`.
    pub fn observation_scores(&self, data: &MixtureData) -> MixtureResult<Array2<f64>> {
        observation_scores(self.params()?, data, &self.shape)
    }

    /// Observed information of the average log-likelihood at θ̂, `P × P`.
    ///
    /// Finite differences of the analytic score. Perturbations that leave
    /// the parameter space yield a non-finite gradient, which the Hessian
    /// routine rejects.
    ///
    /// ## Errors
    /// - `ModelNotFitted` before `fit`.
    /// - `OptimizationFailed` when no valid finite-difference Hessian exists.
    pub fn observed_information(&self, data: &MixtureData) -> MixtureResult<Array2<f64>> {
        let theta_hat = self.theta_hat()?;
        let n = data.n_obs() as f64;
        let neg_avg_grad = |theta: &Array1<f64>| -> Array1<f64> {
            match MixtureParams::from_theta(theta.view(), &self.shape, data)
                .and_then(|p| score_sum(&p, data, &self.shape))
            {
                Ok(g) => g.mapv(|v| -v / n),
                Err(_) => Array1::from_elem(theta.len(), f64::NAN),
            }
        };
        Ok(compute_hessian(&neg_avg_grad, &theta_hat)?)
    }

    /// Covariance of θ̂, `P × P`.
    ///
    /// `Ml` is `J⁺ / n`; `Mlr` is the sandwich `J⁺ S J⁺ / n` with the OPG
    /// meat `S`. Weakly identified directions get zero variance; see
    /// [`MixtureModel::information_condition_number`].
    pub fn covariance_matrix(
        &self, data: &MixtureData, estimator: VarianceEstimator,
    ) -> MixtureResult<Array2<f64>> {
        let info = self.observed_information(data)?;
        self.covariance_from(&info, data, estimator)
    }

    fn covariance_from(
        &self, info: &Array2<f64>, data: &MixtureData, estimator: VarianceEstimator,
    ) -> MixtureResult<Array2<f64>> {
        let meat = match estimator {
            VarianceEstimator::Ml => None,
            VarianceEstimator::Mlr => {
                Some(average_score_covariance(&self.observation_scores(data)?)?)
            }
        };
        Ok(covariance_from_information(info, meat.as_ref()) / data.n_obs() as f64)
    }

    /// Standard errors of θ̂.
    pub fn standard_errors(
        &self, data: &MixtureData, estimator: VarianceEstimator,
    ) -> MixtureResult<Array1<f64>> {
        let cov = self.covariance_matrix(data, estimator)?;
        Ok(cov.diag().mapv(|v| v.max(0.0).sqrt()))
    }

    /// Labelled parameter table with Wald z-tests and the information
    /// condition number.
    pub fn parameter_estimates(
        &self, data: &MixtureData, estimator: VarianceEstimator,
    ) -> MixtureResult<ParameterTable> {
        let theta = self.theta_hat()?;
        let info = self.observed_information(data)?;
        let se = self.covariance_from(&info, data, estimator)?.diag().mapv(|v| v.max(0.0).sqrt());
        let labels: Vec<(String, Option<usize>)> = MixtureParams::labels(&self.shape, data)
            .into_iter()
            .map(|l| (l.name, l.class))
            .collect();
        let rows = wald_table(&labels, &theta.to_vec(), &se.to_vec())?;
        let condition_number = condition_number(&info);
        if condition_number < WEAK_IDENTIFICATION {
            warn!(
                k = self.shape.n_classes,
                condition_number,
                "information matrix nearly singular; standard errors unreliable"
            );
        }
        Ok(ParameterTable { rows, estimator, condition_number })
    }

    /// Smallest over largest eigenvalue of the observed information.
    ///
    /// Values near zero flag an empirically under-identified solution.
    pub fn information_condition_number(&self, data: &MixtureData) -> MixtureResult<f64> {
        Ok(condition_number(&self.observed_information(data)?))
    }

    /// Save file text: indicators, posterior probabilities and modal class.
    pub fn save_data(&self, data: &MixtureData, opts: &SaveOptions) -> MixtureResult<String> {
        format_save(data, self.posterior()?, opts)
    }

    /// Simulate a data set of the same layout from the fitted parameters.
    pub fn simulate(&self, template: &MixtureData, seed: u64) -> MixtureResult<MixtureData> {
        simulate(self.params()?, template, seed)
    }
}

impl LogLikelihood for MixtureModel {
    type Data = MixtureData;

    /// Observed-data log-likelihood at reporting vector θ.
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<f64> {
        let params = MixtureParams::from_theta(theta.view(), &self.shape, data)?;
        Ok(loglik(&params, data)?)
    }

    /// Length and finiteness of θ.
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()> {
        validate_theta(theta.view(), self.shape.n_free_params(data))?;
        Ok(())
    }

    /// Analytic score `Σ_i s_i(θ)`.
    fn grad(&self, theta: &Theta, data: &Self::Data) -> OptResult<Grad> {
        let params = MixtureParams::from_theta(theta.view(), &self.shape, data)?;
        Ok(score_sum(&params, data, &self.shape)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::core::{
        data::IndicatorKind, options::StartOptions, save::SaveOptions, shape::VarianceStructure,
    };
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Canonical class order after fitting.
    // - `ModelNotFitted` before fitting.
    // - Positive, finite standard errors and the ML / MLR estimators.
    // - The `LogLikelihood` impl agreeing with the fitted log-likelihood.
    //
    // They intentionally DO NOT cover:
    // - Start-search reduction rules (see `multistart`).
    // -------------------------------------------------------------------------

    fn two_groups() -> MixtureData {
        let mut y = Vec::new();
        for i in 0..60 {
            let jitter = ((i % 7) as f64 - 3.0) * 0.25;
            y.push(if i < 20 { 6.0 + jitter } else { jitter });
        }
        let values = Array2::from_shape_vec((60, 1), y).unwrap();
        MixtureData::new(values.view(), &[IndicatorKind::Continuous], Some(vec!["y".to_string()]))
            .unwrap()
    }

    fn model(k: usize) -> MixtureModel {
        let shape = MixtureShape::new(k, VarianceStructure::Equal).unwrap();
        let mut options = FitOptions::default();
        options.starts = StartOptions::default().with_seed(11);
        options.starts.initial_starts = 8;
        options.starts.final_starts = 4;
        MixtureModel::new(shape, options)
    }

    #[test]
    // Purpose
    // -------
    // Verify that the larger class comes first after fitting.
    //
    // Given
    // -----
    // - 40 observations near 0 and 20 near 6.
    //
    // Expect
    // ------
    // - Class 0 has mean near 0 and proportion near 2/3; class 1 mean near 6.
    fn fit_orders_classes_by_size() {
        // Arrange
        let data = two_groups();
        let mut m = model(2);

        // Act
        let result = m.fit(&data).unwrap().clone();
        let params = m.params().unwrap();

        // Assert
        assert!(result.converged);
        let props = params.mean_proportions(&data);
        assert_relative_eq!(props[0], 2.0 / 3.0, epsilon = 1e-3);
        match &params.indicators[0] {
            crate::mixture::core::params::IndicatorParams::Continuous { means, .. } => {
                assert!(means[0].abs() < 0.2);
                assert!((means[1] - 6.0).abs() < 0.2);
            }
            _ => panic!("expected continuous block"),
        }
        assert_eq!(m.posterior().unwrap().n_classes(), 2);
        assert!(m.stopped.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Ensure accessors refuse to answer before `fit`.
    //
    // Given
    // -----
    // - A fresh model.
    //
    // Expect
    // ------
    // - `ModelNotFitted` from result, params, scores and save.
    fn accessors_require_fit() {
        let data = two_groups();
        let m = model(2);
        assert_eq!(m.result().unwrap_err(), MixtureError::ModelNotFitted);
        assert_eq!(m.params().unwrap_err(), MixtureError::ModelNotFitted);
        assert_eq!(m.observation_scores(&data).unwrap_err(), MixtureError::ModelNotFitted);
        assert_eq!(
            m.save_data(&data, &SaveOptions::default()).unwrap_err(),
            MixtureError::ModelNotFitted
        );
    }

    #[test]
    // Purpose
    // -------
    // Check standard errors and the parameter table at a well separated fit.
    //
    // Given
    // -----
    // - The two-group data with K = 2.
    //
    // Expect
    // ------
    // - Finite, positive SEs for both estimators; one table row per θ entry;
    //   the class-0 mean SE is close to sqrt(σ² / n₀).
    // - The table reports its estimator and the same condition number as
    //   `information_condition_number`, in (0, 1].
    fn standard_errors_are_positive_and_sized() {
        // Arrange
        let data = two_groups();
        let mut m = model(2);
        m.fit(&data).unwrap();

        // Act
        let se_ml = m.standard_errors(&data, VarianceEstimator::Ml).unwrap();
        let se_mlr = m.standard_errors(&data, VarianceEstimator::Mlr).unwrap();
        let table = m.parameter_estimates(&data, VarianceEstimator::Mlr).unwrap();

        // Assert
        let p = m.shape.n_free_params(&data);
        assert_eq!(se_ml.len(), p);
        assert_eq!(table.len(), p);
        assert!(se_ml.iter().chain(se_mlr.iter()).all(|s| s.is_finite() && *s > 0.0));
        let theta = m.theta_hat().unwrap();
        // θ layout: [logit, mean0, mean1, variance]
        let expected = (theta[3] / 40.0).sqrt();
        assert_relative_eq!(se_ml[1], expected, max_relative = 0.2);
        assert_eq!(table.rows[1].label, "Mean(y)");
        assert_eq!(table.rows[1].class, Some(0));
        assert_eq!(table.row("Mean(y)", Some(0)), Some(&table.rows[1]));
        assert_eq!(table.estimator, VarianceEstimator::Mlr);
        let kappa = m.information_condition_number(&data).unwrap();
        assert!(kappa > 0.0 && kappa <= 1.0);
        assert_relative_eq!(table.condition_number, kappa, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the `LogLikelihood` impl against the stored fit.
    //
    // Given
    // -----
    // - A fitted model and its θ̂.
    //
    // Expect
    // ------
    // - `value(θ̂)` equals the reported log-likelihood; the gradient is near 0.
    fn loglikelihood_impl_matches_fit() {
        let data = two_groups();
        let mut m = model(2);
        let ll = m.fit(&data).unwrap().loglik;
        let theta = m.theta_hat().unwrap();
        m.check(&theta, &data).unwrap();
        assert_relative_eq!(m.value(&theta, &data).unwrap(), ll, epsilon = 1e-8);
        let g = m.grad(&theta, &data).unwrap();
        assert!(g.iter().all(|v| v.abs() < 5e-2));
    }
}
