//! statistical_tests::vlmr — Vuong–Lo–Mendell–Rubin likelihood-ratio test.
//!
//! Purpose
//! -------
//! Compare a fitted K-class mixture (alternative) against a fitted model with
//! fewer classes (null) on the same data. The classical χ² reference does not
//! apply because the null sits on the boundary of the alternative's
//! parameter space; instead the statistic is referred to a weighted sum of
//! independent χ²(1) variables.
//!
//! Key behaviors
//! -------------
//! - `LR = 2(LL_alt − LL_null)`, floored at 0.
//! - Weights: eigenvalues of Vuong's matrix
//!   `W = [[ B_aa J_a⁺,  B_an J_n⁺ ], [ −B_na J_a⁺, −B_nn J_n⁺ ]]`, where
//!   `J` is the observed information of the average log-likelihood and
//!   `B_xy = (1/n) Σ_i s_x,i s_y,iᵀ` are outer products of per-observation
//!   scores at each model's estimate.
//! - p-value by Monte Carlo over `draws` replications of `Σ λ_j Z_j²` with
//!   a seeded `Pcg64`.
//! - Lo–Mendell–Rubin adjustment `LMR = LR / (1 + 1/(Δp ln n))` against the
//!   same reference.
//! - When the weights cannot be formed (information or score failures,
//!   no positive eigenvalue) the test falls back to `χ²(Δp)` and records
//!   that in [`VlmrReference`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Both models are fitted on `data`, with `K_alt > K_null`.
//! - Only the real parts of the eigenvalues of the non-symmetric `W` are
//!   used; non-finite eigenvalues count as a failed decomposition.
//!
//! Conventions
//! -----------
//! - Logs a `warn` event when falling back to χ².
use nalgebra::DMatrix;
use ndarray::{Array2, s};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::warn;

use crate::{
    inference::{hessian::covariance_from_information, scores::average_score_covariance},
    mixture::{core::data::MixtureData, models::mixture::MixtureModel},
    optimization::numerical_stability::transformations::EIGEN_EPS,
    statistical_tests::errors::{TestError, TestResult},
};

/// Monte Carlo settings for the weighted χ² reference.
///
/// Defaults: 10 000 draws, seed 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlmrOptions {
    pub draws: usize,
    pub seed: u64,
}

impl VlmrOptions {
    pub fn new(draws: usize, seed: u64) -> TestResult<Self> {
        if draws == 0 {
            return Err(TestError::InvalidDraws { draws });
        }
        Ok(VlmrOptions { draws, seed })
    }
}

impl Default for VlmrOptions {
    fn default() -> Self {
        VlmrOptions { draws: 10_000, seed: 0 }
    }
}

/// Reference distribution actually used for the p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlmrReference {
    /// Weighted sum of χ²(1) with this many non-zero weights.
    WeightedChiSquare { n_weights: usize },
    /// Plain χ² with `Δp` degrees of freedom.
    ChiSquare,
}

/// Outcome of one VLMR / LMR comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct VlmrOutcome {
    null_classes: usize,
    alt_classes: usize,
    lr: f64,
    lmr: f64,
    df: usize,
    p_value: f64,
    lmr_p_value: f64,
    reference: VlmrReference,
}

impl VlmrOutcome {
    /// Run the test of `null` against `alt` on `data`.
    ///
    /// # Errors
    /// - `Mixture(ModelNotFitted)` when either model is unfitted.
    /// - `NotNested` unless `alt` has more classes than `null`.
    /// - `SampleSizeMismatch` when the fits and `data` disagree on `n`.
    /// - `InvalidDistribution` if the χ² fallback cannot be constructed.
    pub fn vlmr(
        null: &MixtureModel, alt: &MixtureModel, data: &MixtureData, opts: &VlmrOptions,
    ) -> TestResult<Self> {
        let r_null = null.result()?;
        let r_alt = alt.result()?;
        if r_alt.n_classes <= r_null.n_classes {
            return Err(TestError::NotNested { null_k: r_null.n_classes, alt_k: r_alt.n_classes });
        }
        let n = data.n_obs();
        if r_null.n_obs != r_alt.n_obs || r_alt.n_obs != n {
            return Err(TestError::SampleSizeMismatch { null_n: r_null.n_obs, alt_n: r_alt.n_obs });
        }

        let lr = (2.0 * (r_alt.loglik - r_null.loglik)).max(0.0);
        let df = r_alt.n_params.saturating_sub(r_null.n_params).max(1);
        let lmr = lr / (1.0 + 1.0 / (df as f64 * (n as f64).ln()));

        let weights = match vuong_weights(null, alt, data) {
            Ok(w) if w.iter().any(|&l| l > EIGEN_EPS) => Some(w),
            Ok(_) => {
                warn!(
                    null_k = r_null.n_classes,
                    alt_k = r_alt.n_classes,
                    "no positive LR weights; using chi-square reference"
                );
                None
            }
            Err(e) => {
                warn!(
                    null_k = r_null.n_classes,
                    alt_k = r_alt.n_classes,
                    error = %e,
                    "LR weights unavailable; using chi-square reference"
                );
                None
            }
        };

        let (p_value, lmr_p_value, reference) = match weights {
            Some(w) => {
                let (p, p_lmr) = weighted_chi_square_p_values(&w, lr, lmr, opts);
                (p, p_lmr, VlmrReference::WeightedChiSquare { n_weights: w.len() })
            }
            None => {
                let chi = ChiSquared::new(df as f64)
                    .map_err(|e| TestError::InvalidDistribution { text: e.to_string() })?;
                (1.0 - chi.cdf(lr), 1.0 - chi.cdf(lmr), VlmrReference::ChiSquare)
            }
        };

        Ok(VlmrOutcome {
            null_classes: r_null.n_classes,
            alt_classes: r_alt.n_classes,
            lr,
            lmr,
            df,
            p_value,
            lmr_p_value,
            reference,
        })
    }

    pub fn null_classes(&self) -> usize {
        self.null_classes
    }

    pub fn alt_classes(&self) -> usize {
        self.alt_classes
    }

    /// `2(LL_alt − LL_null)`.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Lo–Mendell–Rubin adjusted statistic.
    pub fn lmr(&self) -> f64 {
        self.lmr
    }

    /// Difference in free parameters.
    pub fn df(&self) -> usize {
        self.df
    }

    pub fn p_value(&self) -> f64 {
        self.p_value
    }

    pub fn lmr_p_value(&self) -> f64 {
        self.lmr_p_value
    }

    pub fn reference(&self) -> VlmrReference {
        self.reference
    }
}

/// Real eigenvalues of Vuong's `W` with negligible ones removed.
fn vuong_weights(
    null: &MixtureModel, alt: &MixtureModel, data: &MixtureData,
) -> TestResult<Vec<f64>> {
    let s_alt = alt.observation_scores(data)?;
    let s_null = null.observation_scores(data)?;
    let j_alt_inv = covariance_from_information(&alt.observed_information(data)?, None);
    let j_null_inv = covariance_from_information(&null.observed_information(data)?, None);
    let w = vuong_matrix(&s_alt, &s_null, &j_alt_inv, &j_null_inv)?;
    eigen_weights(&w)
}

/// Assemble `W` from scores and inverse information of both models.
fn vuong_matrix(
    s_alt: &Array2<f64>, s_null: &Array2<f64>, j_alt_inv: &Array2<f64>, j_null_inv: &Array2<f64>,
) -> TestResult<Array2<f64>> {
    let n = s_alt.nrows();
    if s_null.nrows() != n {
        return Err(TestError::SampleSizeMismatch { null_n: s_null.nrows(), alt_n: n });
    }
    let pa = s_alt.ncols();
    let pn = s_null.ncols();
    let b_aa = average_score_covariance(s_alt)?;
    let b_nn = average_score_covariance(s_null)?;
    let b_an = s_alt.t().dot(s_null) / n as f64;
    let b_na = b_an.t().to_owned();

    let mut w = Array2::<f64>::zeros((pa + pn, pa + pn));
    w.slice_mut(s![..pa, ..pa]).assign(&b_aa.dot(j_alt_inv));
    w.slice_mut(s![..pa, pa..]).assign(&b_an.dot(j_null_inv));
    w.slice_mut(s![pa.., ..pa]).assign(&(-b_na.dot(j_alt_inv)));
    w.slice_mut(s![pa.., pa..]).assign(&(-b_nn.dot(j_null_inv)));
    Ok(w)
}

fn eigen_weights(w: &Array2<f64>) -> TestResult<Vec<f64>> {
    let m = w.nrows();
    let mat = DMatrix::<f64>::from_fn(m, m, |i, j| w[[i, j]]);
    let eig = mat.complex_eigenvalues();
    if eig.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(TestError::EigenDecompositionFailed);
    }
    let scale = eig.iter().map(|z| z.re.abs()).fold(0.0, f64::max).max(1.0);
    Ok(eig.iter().map(|z| z.re).filter(|l| l.abs() > EIGEN_EPS * scale).collect())
}

/// Monte Carlo upper-tail probabilities of `Σ λ_j Z_j²` at `lr` and `lmr`.
fn weighted_chi_square_p_values(
    weights: &[f64], lr: f64, lmr: f64, opts: &VlmrOptions,
) -> (f64, f64) {
    let mut rng = Pcg64::seed_from_u64(opts.seed);
    let mut above_lr = 0usize;
    let mut above_lmr = 0usize;
    for _ in 0..opts.draws {
        let stat: f64 = weights
            .iter()
            .map(|&l| {
                let z: f64 = StandardNormal.sample(&mut rng);
                l * z * z
            })
            .sum();
        if stat >= lr {
            above_lr += 1;
        }
        if stat >= lmr {
            above_lmr += 1;
        }
    }
    let draws = opts.draws as f64;
    (above_lr as f64 / draws, above_lmr as f64 / draws)
}
