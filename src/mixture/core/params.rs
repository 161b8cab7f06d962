//! Mixture parameterization: class logits and class-conditional indicator
//! parameters, plus the mapping to and from the reporting vector θ.
//!
//! ## What this module defines
//! - [`IndicatorParams`]: per-indicator block, either Gaussian means and
//!   variances or a `K × C` matrix of category probabilities.
//! - [`MixtureParams`]: class-membership logits (`K × (1 + Q)`, last class
//!   the reference with a zero row) and one [`IndicatorParams`] per column.
//! - [`ParamLabel`]: human-readable name of each θ entry.
//!
//! ## Reporting parameterization θ
//! Entries appear in this order:
//! 1. class logits, classes `0..K−1` (reference excluded), each row holding
//!    the intercept followed by the `Q` covariate slopes;
//! 2. for each indicator in column order:
//!    - continuous: `K` means, then `1` (equal) or `K` (varying) variances;
//!    - categorical: for each class, `C − 1` thresholds
//!      `τ_kc = logit P(u ≤ c | k)`.
//!
//! ## Invariants validated by constructors
//! - Every indicator block has `K` classes and matches the data layout.
//! - Variances are finite and strictly positive.
//! - Category probability rows are ≥ `PROB_FLOOR` and sum to one.
//! - The last row of `logits` is zero.
//!
//! Mapping θ → parameters floors threshold-implied probabilities at
//! `PROB_FLOOR` and renormalizes, so non-monotone thresholds never yield
//! negative probabilities.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis, s};

use crate::{
    mixture::{
        core::{
            data::{Indicator, MixtureData},
            shape::{MixtureShape, VarianceStructure},
            validation::{validate_theta, validate_variances},
        },
        errors::{MixtureError, MixtureResult},
    },
    optimization::{
        loglik_optimizer::Theta,
        numerical_stability::{floor_and_normalize, log_sum_exp, safe_logistic, safe_logit},
    },
};

/// Class-conditional parameters of one indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorParams {
    /// Gaussian means and variances, one entry per class. Under
    /// [`VarianceStructure::Equal`] every entry of `variances` is the same.
    Continuous { means: Array1<f64>, variances: Array1<f64> },
    /// Category probabilities, `K × C`; each row sums to one.
    Categorical { probs: Array2<f64> },
}

impl IndicatorParams {
    pub fn n_classes(&self) -> usize {
        match self {
            IndicatorParams::Continuous { means, .. } => means.len(),
            IndicatorParams::Categorical { probs } => probs.nrows(),
        }
    }

    /// Thresholds `K × (C − 1)` on the logit scale (`None` for continuous).
    pub fn thresholds(&self) -> Option<Array2<f64>> {
        match self {
            IndicatorParams::Continuous { .. } => None,
            IndicatorParams::Categorical { probs } => {
                let (k, c) = probs.dim();
                let mut tau = Array2::<f64>::zeros((k, c - 1));
                for (row, mut out) in probs.rows().into_iter().zip(tau.rows_mut()) {
                    let mut cum = 0.0;
                    for level in 0..c - 1 {
                        cum += row[level];
                        out[level] = safe_logit(cum);
                    }
                }
                Some(tau)
            }
        }
    }

    fn permuted(&self, order: &[usize]) -> IndicatorParams {
        match self {
            IndicatorParams::Continuous { means, variances } => IndicatorParams::Continuous {
                means: means.select(Axis(0), order),
                variances: variances.select(Axis(0), order),
            },
            IndicatorParams::Categorical { probs } => {
                IndicatorParams::Categorical { probs: probs.select(Axis(0), order) }
            }
        }
    }
}

/// Category probabilities implied by thresholds `τ_0 < … < τ_{C−2}`:
/// `p_c = F(τ_c) − F(τ_{c−1})` with `F` the logistic CDF, written into `out`
/// (length `C`). Crossing thresholds produce negative differences, which
/// callers floor and renormalize.
pub fn probs_from_thresholds(tau: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
    let mut prev = 0.0;
    for (level, &t) in tau.iter().enumerate() {
        let cum = safe_logistic(t);
        out[level] = cum - prev;
        prev = cum;
    }
    out[tau.len()] = 1.0 - prev;
}

/// Name of a single θ entry for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLabel {
    /// Parameter kind and variable, e.g. `Mean(y1)` or `Logit(Intercept)`.
    pub name: String,
    /// 0-based class the entry belongs to; `None` for class-invariant
    /// entries (equal variances).
    pub class: Option<usize>,
}

/// Full parameter set of a K-class mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureParams {
    /// Class-membership logits, `K × (1 + Q)`; row `K − 1` is zero.
    pub logits: Array2<f64>,
    /// One block per indicator, in column order.
    pub indicators: Vec<IndicatorParams>,
}

impl MixtureParams {
    /// Build validated parameters.
    ///
    /// The logits are re-referenced so that the last class row is zero;
    /// categorical probability rows are floored and renormalized.
    ///
    /// # Errors
    /// - `LayoutMismatch` when block sizes disagree with `logits`.
    /// - `InvalidVariance` for non-positive or non-finite variances.
    pub fn new(
        mut logits: Array2<f64>, mut indicators: Vec<IndicatorParams>,
    ) -> MixtureResult<Self> {
        let k = logits.nrows();
        if k == 0 || logits.ncols() == 0 {
            return Err(MixtureError::LayoutMismatch { reason: "empty logit matrix" });
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(MixtureError::LayoutMismatch { reason: "non-finite class logits" });
        }
        let reference = logits.row(k - 1).to_owned();
        for mut row in logits.rows_mut() {
            row -= &reference;
        }
        for (j, block) in indicators.iter_mut().enumerate() {
            if block.n_classes() != k {
                return Err(MixtureError::LayoutMismatch {
                    reason: "indicator block class count differs from logits",
                });
            }
            match block {
                IndicatorParams::Continuous { means, variances } => {
                    if means.iter().any(|m| !m.is_finite()) {
                        return Err(MixtureError::LayoutMismatch { reason: "non-finite class mean" });
                    }
                    validate_variances(variances.view(), j)?;
                }
                IndicatorParams::Categorical { probs } => {
                    if probs.ncols() < 2 {
                        return Err(MixtureError::LayoutMismatch {
                            reason: "categorical block needs at least two levels",
                        });
                    }
                    for row in probs.rows_mut() {
                        floor_and_normalize(row);
                    }
                }
            }
        }
        Ok(MixtureParams { logits, indicators })
    }

    pub fn n_classes(&self) -> usize {
        self.logits.nrows()
    }

    /// Check that the blocks line up with `data` (kinds, level counts,
    /// covariate count).
    pub fn check_layout(&self, data: &MixtureData) -> MixtureResult<()> {
        if self.logits.ncols() != 1 + data.n_covariates() {
            return Err(MixtureError::LayoutMismatch {
                reason: "logit columns differ from 1 + number of covariates",
            });
        }
        if self.indicators.len() != data.n_indicators() {
            return Err(MixtureError::LayoutMismatch {
                reason: "number of indicator blocks differs from data",
            });
        }
        for (block, ind) in self.indicators.iter().zip(&data.indicators) {
            let ok = match (block, ind) {
                (IndicatorParams::Continuous { .. }, Indicator::Continuous { .. }) => true,
                (IndicatorParams::Categorical { probs }, Indicator::Categorical { levels, .. }) => {
                    probs.ncols() == levels.len()
                }
                _ => false,
            };
            if !ok {
                return Err(MixtureError::LayoutMismatch {
                    reason: "indicator block kind or level count differs from data",
                });
            }
        }
        Ok(())
    }

    /// Write `ln π_k(z)` for design row `z = (1, z_1, …, z_Q)` into `out`.
    pub fn log_class_probs_into(&self, z: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
        for (k, row) in self.logits.rows().into_iter().enumerate() {
            out[k] = row.dot(&z);
        }
        let lse = match out.as_slice() {
            Some(slice) => log_sum_exp(slice),
            None => log_sum_exp(&out.to_vec()),
        };
        out.mapv_inplace(|v| v - lse);
    }

    /// Class probabilities `π(z)` for design row `z`.
    pub fn class_probs(&self, z: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut out = Array1::<f64>::zeros(self.n_classes());
        self.log_class_probs_into(z, out.view_mut());
        out.mapv_inplace(f64::exp);
        out
    }

    /// Model-estimated class proportions: `π̄_k = (1/n) Σ_i π_k(z_i)`.
    ///
    /// Without covariates every `π(z_i)` is the same and this is the
    /// softmax of the intercepts.
    pub fn mean_proportions(&self, data: &MixtureData) -> Array1<f64> {
        if !data.has_covariates() {
            return self.class_probs(data.design_row(0));
        }
        let n = data.n_obs();
        let mut total = Array1::<f64>::zeros(self.n_classes());
        for i in 0..n {
            total += &self.class_probs(data.design_row(i));
        }
        total / n as f64
    }

    /// Class order sorted by descending model-estimated proportion; ties
    /// keep the original order. `order[c]` is the current label of canonical
    /// class `c`.
    pub fn canonical_order(&self, data: &MixtureData) -> Vec<usize> {
        let props = self.mean_proportions(data);
        let mut order: Vec<usize> = (0..self.n_classes()).collect();
        order.sort_by(|&a, &b| props[b].total_cmp(&props[a]));
        order
    }

    /// Reorder classes so that new class `c` is current class `order[c]`;
    /// logits are re-referenced to the new last class.
    pub fn relabel(&self, order: &[usize]) -> MixtureResult<MixtureParams> {
        let k = self.n_classes();
        let mut seen = vec![false; k];
        if order.len() != k || order.iter().any(|&c| c >= k || std::mem::replace(&mut seen[c], true))
        {
            return Err(MixtureError::LayoutMismatch { reason: "relabel order is not a permutation" });
        }
        let logits = self.logits.select(Axis(0), order);
        let indicators = self.indicators.iter().map(|b| b.permuted(order)).collect();
        MixtureParams::new(logits, indicators)
    }

    /// Flatten into the reporting vector θ (see module docs for the layout).
    pub fn to_theta(&self, shape: &MixtureShape) -> Theta {
        let k = self.n_classes();
        let mut out: Vec<f64> = Vec::new();
        for row in self.logits.slice(s![..k - 1, ..]).rows() {
            out.extend(row.iter());
        }
        for block in &self.indicators {
            match block {
                IndicatorParams::Continuous { means, variances } => {
                    out.extend(means.iter());
                    match shape.variances {
                        VarianceStructure::Equal => out.push(variances[0]),
                        VarianceStructure::Varying => out.extend(variances.iter()),
                    }
                }
                IndicatorParams::Categorical { .. } => {
                    if let Some(tau) = block.thresholds() {
                        out.extend(tau.iter());
                    }
                }
            }
        }
        Theta::from(out)
    }

    /// Rebuild parameters from a reporting vector θ.
    ///
    /// # Errors
    /// - `ThetaLengthMismatch` / `NonFiniteTheta` for malformed θ.
    /// - `InvalidVariance` when a variance entry is not strictly positive.
    pub fn from_theta(
        theta: ArrayView1<'_, f64>, shape: &MixtureShape, data: &MixtureData,
    ) -> MixtureResult<MixtureParams> {
        validate_theta(theta, shape.n_free_params(data))?;
        let k = shape.n_classes;
        let width = 1 + data.n_covariates();

        let mut logits = Array2::<f64>::zeros((k, width));
        let mut pos = 0usize;
        for row in 0..k - 1 {
            for col in 0..width {
                logits[[row, col]] = theta[pos];
                pos += 1;
            }
        }

        let mut indicators = Vec::with_capacity(data.n_indicators());
        for (j, ind) in data.indicators.iter().enumerate() {
            match ind {
                Indicator::Continuous { .. } => {
                    let means = theta.slice(s![pos..pos + k]).to_owned();
                    pos += k;
                    let variances = match shape.variances {
                        VarianceStructure::Equal => {
                            let v = theta[pos];
                            pos += 1;
                            Array1::from_elem(k, v)
                        }
                        VarianceStructure::Varying => {
                            let v = theta.slice(s![pos..pos + k]).to_owned();
                            pos += k;
                            v
                        }
                    };
                    validate_variances(variances.view(), j)?;
                    indicators.push(IndicatorParams::Continuous { means, variances });
                }
                Indicator::Categorical { levels, .. } => {
                    let c = levels.len();
                    let mut probs = Array2::<f64>::zeros((k, c));
                    for row in probs.rows_mut() {
                        probs_from_thresholds(theta.slice(s![pos..pos + c - 1]), row);
                        pos += c - 1;
                    }
                    indicators.push(IndicatorParams::Categorical { probs });
                }
            }
        }
        MixtureParams::new(logits, indicators)
    }

    /// Labels for every θ entry, aligned with [`MixtureParams::to_theta`].
    pub fn labels(shape: &MixtureShape, data: &MixtureData) -> Vec<ParamLabel> {
        let k = shape.n_classes;
        let mut out = Vec::with_capacity(shape.n_free_params(data));
        for class in 0..k - 1 {
            out.push(ParamLabel { name: "Logit(Intercept)".to_string(), class: Some(class) });
            for cov in &data.covariate_names {
                out.push(ParamLabel { name: format!("Logit({cov})"), class: Some(class) });
            }
        }
        for (name, ind) in data.names.iter().zip(&data.indicators) {
            match ind {
                Indicator::Continuous { .. } => {
                    for class in 0..k {
                        out.push(ParamLabel { name: format!("Mean({name})"), class: Some(class) });
                    }
                    match shape.variances {
                        VarianceStructure::Equal => {
                            out.push(ParamLabel { name: format!("Variance({name})"), class: None })
                        }
                        VarianceStructure::Varying => {
                            for class in 0..k {
                                out.push(ParamLabel {
                                    name: format!("Variance({name})"),
                                    class: Some(class),
                                });
                            }
                        }
                    }
                }
                Indicator::Categorical { levels, .. } => {
                    for class in 0..k {
                        for level in &levels[..levels.len() - 1] {
                            out.push(ParamLabel {
                                name: format!("Threshold({name}<={level})"),
                                class: Some(class),
                            });
                        }
                    }
                }
            }
        }
        out
    }
}
