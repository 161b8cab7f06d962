//! Numerical stability utilities.
//!
//! Provides safe implementations of the nonlinear transforms that mixture
//! estimation leans on in every E-step and M-step, where naïve formulas
//! overflow or underflow: normalizing log class weights, mapping logits to
//! probabilities and back, and flooring probabilities and variances away
//! from the boundary of the parameter space.
//!
//! # Provided items
//! - [`EIGEN_EPS`], [`GENERAL_TOL`]: shared tolerances for eigenvalue
//!   truncation and near-zero denominators.
//! - [`PROB_FLOOR`], [`VARIANCE_FLOOR_RATIO`], [`LOGIT_EPS`]: floors that
//!   keep categorical probabilities, class variances and logits finite.
//! - [`log_sum_exp`], [`softmax_in_place`], [`safe_logistic`],
//!   [`safe_logit`], [`logistic_density`].
use ndarray::{ArrayViewMut1, Zip};

/// Eigenvalues at or below this value are treated as zero when forming
/// pseudoinverses of information matrices.
pub const EIGEN_EPS: f64 = 1e-10;

/// Generic tolerance for denominators and weight sums that should be
/// strictly positive.
pub const GENERAL_TOL: f64 = 1e-12;

/// Lower bound for class-conditional category probabilities.
///
/// A category never observed within a class would otherwise drive its
/// probability to zero and its log-probability to `-∞`.
pub const PROB_FLOOR: f64 = 1e-10;

/// Class variances are floored at this fraction of the indicator's sample
/// variance, which keeps the Gaussian likelihood bounded when a class
/// collapses onto a single observation.
pub const VARIANCE_FLOOR_RATIO: f64 = 1e-6;

/// Clamp for probabilities before taking a logit.
pub const LOGIT_EPS: f64 = 1e-12;

/// Numerically stable `ln Σ exp(x_k)`.
///
/// Shifts by the maximum before exponentiating. Returns `-∞` for an empty
/// slice or when every entry is `-∞`, and propagates `NaN`/`+∞` so callers
/// can detect a broken likelihood.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Replace log weights by their normalized probabilities, in place.
///
/// Returns the log normalizer `ln Σ exp(x_k)`, which is the observation's
/// log-likelihood contribution when the inputs are log joint densities.
pub fn softmax_in_place(mut values: ArrayViewMut1<'_, f64>) -> f64 {
    let lse = match values.as_slice() {
        Some(slice) => log_sum_exp(slice),
        None => log_sum_exp(&values.to_vec()),
    };
    if lse.is_finite() {
        values.mapv_inplace(|v| (v - lse).exp());
    }
    lse
}

/// Numerically stable logistic function `1 / (1 + exp(-x))`.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Logit `ln(p / (1 - p))` with `p` clamped to `[LOGIT_EPS, 1 - LOGIT_EPS]`.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

/// Density of the standard logistic distribution, `F(x)(1 - F(x))`.
pub fn logistic_density(x: f64) -> f64 {
    let f = safe_logistic(x);
    f * (1.0 - f)
}

/// Floor every entry of a probability vector at [`PROB_FLOOR`] and
/// renormalize so the entries sum to one.
pub fn floor_and_normalize(mut probs: ArrayViewMut1<'_, f64>) {
    probs.mapv_inplace(|p| if p.is_finite() { p.max(PROB_FLOOR) } else { PROB_FLOOR });
    let total = probs.sum();
    Zip::from(&mut probs).for_each(|p| *p /= total);
}
