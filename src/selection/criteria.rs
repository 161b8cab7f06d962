//! selection::criteria — information criteria and classification quality.
//!
//! Purpose
//! -------
//! Turn a fitted mixture (log-likelihood, parameter count, posterior) into
//! the comparison statistics used to choose the number of classes.
//!
//! Key behaviors
//! -------------
//! - [`aic`], [`bic`], [`adjusted_bic`] (with `n* = (n + 2) / 24`).
//! - [`entropy`]: relative entropy in `[0, 1]`, exactly 1 for K = 1.
//! - [`classification_matrix`]: average posterior probabilities by most
//!   likely class.
//! - [`ClassCounts`]: model-estimated, posterior-based and most-likely-class
//!   counts with their proportions.
//!
//! Conventions
//! -----------
//! - Smaller information criteria are better.
//! - `0 · ln 0` is taken as 0 in the entropy sum.
//! - Rows of the classification matrix for classes no observation is
//!   assigned to are zero.
use ndarray::{Array1, Array2};

use crate::mixture::core::{
    data::MixtureData, params::MixtureParams, posterior::PosteriorMatrix,
};

/// `AIC = −2LL + 2p`.
pub fn aic(loglik: f64, n_params: usize) -> f64 {
    -2.0 * loglik + 2.0 * n_params as f64
}

/// `BIC = −2LL + p ln n`.
pub fn bic(loglik: f64, n_params: usize, n_obs: usize) -> f64 {
    -2.0 * loglik + n_params as f64 * (n_obs as f64).ln()
}

/// Sample-size adjusted BIC: `−2LL + p ln((n + 2) / 24)`.
pub fn adjusted_bic(loglik: f64, n_params: usize, n_obs: usize) -> f64 {
    -2.0 * loglik + n_params as f64 * ((n_obs as f64 + 2.0) / 24.0).ln()
}

/// Relative entropy `1 − Σ_i Σ_k (−p_ik ln p_ik) / (n ln K)`.
pub fn entropy(posterior: &PosteriorMatrix) -> f64 {
    let k = posterior.n_classes();
    let n = posterior.n_obs();
    if k <= 1 || n == 0 {
        return 1.0;
    }
    let total: f64 = posterior
        .probs()
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum();
    (1.0 - total / (n as f64 * (k as f64).ln())).clamp(0.0, 1.0)
}

/// `K × K` matrix whose row `k` averages the posterior rows of observations
/// with most likely class `k`.
pub fn classification_matrix(posterior: &PosteriorMatrix) -> Array2<f64> {
    let k = posterior.n_classes();
    let modal = posterior.modal_classes();
    let mut sums = Array2::<f64>::zeros((k, k));
    let mut counts = vec![0usize; k];
    for (row, &c) in posterior.probs().rows().into_iter().zip(&modal) {
        let mut target = sums.row_mut(c);
        target += &row;
        counts[c] += 1;
    }
    for (mut row, &count) in sums.rows_mut().into_iter().zip(&counts) {
        if count > 0 {
            row /= count as f64;
        }
    }
    sums
}

/// Class counts in three flavours, each with proportions.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassCounts {
    /// `n · π̄_k` from the estimated class probabilities.
    pub model_based: Array1<f64>,
    /// Column sums of the posterior.
    pub posterior_based: Array1<f64>,
    /// Number of observations whose most likely class is `k`.
    pub modal_based: Array1<f64>,
}

impl ClassCounts {
    pub fn compute(params: &MixtureParams, data: &MixtureData, posterior: &PosteriorMatrix) -> Self {
        let n = data.n_obs() as f64;
        let k = posterior.n_classes();
        let mut modal_based = Array1::<f64>::zeros(k);
        for c in posterior.modal_classes() {
            modal_based[c] += 1.0;
        }
        ClassCounts {
            model_based: params.mean_proportions(data) * n,
            posterior_based: posterior.class_sums(),
            modal_based,
        }
    }

    fn n_obs(&self) -> f64 {
        self.modal_based.sum()
    }

    pub fn model_proportions(&self) -> Array1<f64> {
        &self.model_based / self.n_obs()
    }

    pub fn posterior_proportions(&self) -> Array1<f64> {
        &self.posterior_based / self.n_obs()
    }

    pub fn modal_proportions(&self) -> Array1<f64> {
        &self.modal_based / self.n_obs()
    }
}

/// The three information criteria for one fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InformationCriteria {
    pub aic: f64,
    pub bic: f64,
    pub adjusted_bic: f64,
}

impl InformationCriteria {
    pub fn new(loglik: f64, n_params: usize, n_obs: usize) -> Self {
        InformationCriteria {
            aic: aic(loglik, n_params),
            bic: bic(loglik, n_params, n_obs),
            adjusted_bic: adjusted_bic(loglik, n_params, n_obs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Closed-form criteria on hand-computed values.
    // - Entropy bounds: 1 for hard assignments and K = 1, 0 for uniform.
    // - Classification matrix rows and empty classes.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify the information criteria formulas.
    //
    // Given
    // -----
    // - LL = −100, p = 5, n = 22 (so n* = 1 and ln n* = 0).
    //
    // Expect
    // ------
    // - AIC = 210, BIC = 200 + 5 ln 22, adjusted BIC = 200.
    fn criteria_match_closed_forms() {
        assert_relative_eq!(aic(-100.0, 5), 210.0);
        assert_relative_eq!(bic(-100.0, 5, 22), 200.0 + 5.0 * 22f64.ln());
        assert_relative_eq!(adjusted_bic(-100.0, 5, 22), 200.0, epsilon = 1e-12);
        let ic = InformationCriteria::new(-100.0, 5, 22);
        assert_relative_eq!(ic.aic, 210.0);
    }

    #[test]
    // Purpose
    // -------
    // Check entropy at its bounds.
    //
    // Given
    // -----
    // - One-hot posteriors, uniform posteriors, and a single class.
    //
    // Expect
    // ------
    // - 1.0, 0.0 and 1.0 respectively.
    fn entropy_hits_bounds() {
        let hard = PosteriorMatrix::new(array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let flat = PosteriorMatrix::new(array![[0.5, 0.5], [0.5, 0.5]]).unwrap();
        let single = PosteriorMatrix::new(array![[1.0], [1.0]]).unwrap();
        assert_relative_eq!(entropy(&hard), 1.0);
        assert_relative_eq!(entropy(&flat), 0.0, epsilon = 1e-12);
        assert_relative_eq!(entropy(&single), 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Verify classification matrix averaging and the empty-class rule.
    //
    // Given
    // -----
    // - Three observations, all most likely in class 0 of three classes.
    //
    // Expect
    // ------
    // - Row 0 is the column mean; rows 1 and 2 are zero.
    fn classification_matrix_averages_by_modal_class() {
        let post =
            PosteriorMatrix::new(array![[0.8, 0.1, 0.1], [0.6, 0.3, 0.1], [0.7, 0.2, 0.1]]).unwrap();
        let m = classification_matrix(&post);
        assert_relative_eq!(m[[0, 0]], 0.7, epsilon = 1e-12);
        assert_relative_eq!(m[[0, 1]], 0.2, epsilon = 1e-12);
        assert_eq!(m.row(1).sum(), 0.0);
        assert_eq!(m.row(2).sum(), 0.0);
    }
}
