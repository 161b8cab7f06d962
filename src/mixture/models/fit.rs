//! Frozen summary of a fitted class count.
//!
//! [`FitResult`] is built once from the canonical (relabelled) solution of a
//! start search and never mutated afterwards. It carries everything the
//! model-selection layer compares across class counts.
use ndarray::Array2;

use crate::{
    mixture::{
        core::{
            data::MixtureData, params::MixtureParams, posterior::PosteriorMatrix,
            shape::MixtureShape,
        },
        models::{em::EMStatus, multistart::StartSearch},
    },
    selection::criteria::{ClassCounts, InformationCriteria, classification_matrix, entropy},
};

/// Summary statistics of one fitted mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub n_classes: usize,
    pub loglik: f64,
    pub n_params: usize,
    pub n_obs: usize,
    pub aic: f64,
    pub bic: f64,
    pub adjusted_bic: f64,
    pub entropy: f64,
    pub class_counts: ClassCounts,
    /// Average posterior probabilities by most likely class, `K × K`.
    pub classification: Array2<f64>,
    /// Seed of the winning start (`None` for the base start).
    pub seed: Option<u64>,
    pub start_index: usize,
    pub converged: bool,
    pub replicated: bool,
    pub replication_count: usize,
    /// EM iterations of the winning start across both stages.
    pub iterations: usize,
    pub status: EMStatus,
    /// `class_order[c]` is the winning start's label of canonical class `c`.
    pub class_order: Vec<usize>,
}

impl FitResult {
    /// Assemble from canonical parameters and posterior.
    pub(crate) fn build(
        search: &StartSearch, params: &MixtureParams, posterior: &PosteriorMatrix,
        data: &MixtureData, shape: &MixtureShape, class_order: Vec<usize>,
    ) -> FitResult {
        let loglik = search.best.loglik;
        let n_params = shape.n_free_params(data);
        let n_obs = data.n_obs();
        let ic = InformationCriteria::new(loglik, n_params, n_obs);
        FitResult {
            n_classes: shape.n_classes,
            loglik,
            n_params,
            n_obs,
            aic: ic.aic,
            bic: ic.bic,
            adjusted_bic: ic.adjusted_bic,
            entropy: entropy(posterior),
            class_counts: ClassCounts::compute(params, data, posterior),
            classification: classification_matrix(posterior),
            seed: search.best_seed,
            start_index: search.best_index,
            converged: search.best.converged(),
            replicated: search.replicated,
            replication_count: search.replication_count,
            iterations: search.best.iterations,
            status: search.best.status,
            class_order,
        }
    }

    pub fn criteria(&self) -> InformationCriteria {
        InformationCriteria { aic: self.aic, bic: self.bic, adjusted_bic: self.adjusted_bic }
    }
}
