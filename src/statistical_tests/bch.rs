//! statistical_tests::bch — BCH comparison of an auxiliary variable across classes.
//!
//! Purpose
//! -------
//! Estimate class-specific means of a continuous distal variable that was
//! not part of the measurement model, correcting for classification error
//! (Bolck–Croon–Hagenaars weights), and test their equality.
//!
//! Key behaviors
//! -------------
//! - Classification-error matrix
//!   `D[c][s] = Σ_i p_ic 1{modal_i = s} / Σ_i p_ic`.
//! - Weights `w_ic = (D⁻¹)[modal_i][c]`; they may be negative.
//! - Class means `μ_c = Σ_i w_ic y_i / Σ_i w_ic` over rows with an observed
//!   auxiliary value.
//! - Sandwich covariance of the means from the estimating equations
//!   `Σ_i w_ic (y_i − μ_c) = 0`.
//! - Overall Wald χ² test of equal means (df K − 1) on successive
//!   differences, and pairwise χ²(1) tests.
//!
//! Invariants & assumptions
//! ------------------------
//! - The posterior is the fitted model's canonical posterior; the auxiliary
//!   variable has one entry per observation, NaN for missing.
//! - Uncertainty in `D` itself is not propagated.
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    inference::hessian::covariance_from_information,
    mixture::core::posterior::PosteriorMatrix,
    statistical_tests::errors::{TestError, TestResult},
};

/// A χ² test statistic with its degrees of freedom and p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquareTest {
    pub stat: f64,
    pub df: usize,
    pub p_value: f64,
}

/// Pairwise equality test between two classes (0-based).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseTest {
    pub class_a: usize,
    pub class_b: usize,
    pub test: ChiSquareTest,
}

/// Outcome of a BCH auxiliary comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BchOutcome {
    classification_error: Array2<f64>,
    means: Array1<f64>,
    covariance: Array2<f64>,
    overall: Option<ChiSquareTest>,
    pairwise: Vec<PairwiseTest>,
    n_used: usize,
}

impl BchOutcome {
    /// Run the BCH comparison for `auxiliary` under `posterior`.
    ///
    /// # Errors
    /// - `AuxiliaryLengthMismatch` when lengths differ.
    /// - `DegenerateClass` for a class with no posterior mass, no effective
    ///   weight or zero sampling variance.
    /// - `SingularClassification` when `D` cannot be inverted.
    pub fn bch(posterior: &PosteriorMatrix, auxiliary: ArrayView1<'_, f64>) -> TestResult<Self> {
        let n = posterior.n_obs();
        let k = posterior.n_classes();
        if auxiliary.len() != n {
            return Err(TestError::AuxiliaryLengthMismatch { expected: n, found: auxiliary.len() });
        }
        let probs = posterior.probs();
        let modal = posterior.modal_classes();

        let d = classification_error(probs, &modal)?;
        let d_inv = DMatrix::<f64>::from_fn(k, k, |i, j| d[[i, j]])
            .try_inverse()
            .ok_or(TestError::SingularClassification)?;

        let mut sum_w = Array1::<f64>::zeros(k);
        let mut sum_wy = Array1::<f64>::zeros(k);
        let mut n_used = 0usize;
        for (i, &y) in auxiliary.iter().enumerate() {
            if y.is_nan() {
                continue;
            }
            n_used += 1;
            for c in 0..k {
                let w = d_inv[(modal[i], c)];
                sum_w[c] += w;
                sum_wy[c] += w * y;
            }
        }
        for (class, &w) in sum_w.iter().enumerate() {
            if w.abs() <= f64::EPSILON {
                return Err(TestError::DegenerateClass { class });
            }
        }
        let means = &sum_wy / &sum_w;

        let mut meat = Array2::<f64>::zeros((k, k));
        let mut u = Array1::<f64>::zeros(k);
        for (i, &y) in auxiliary.iter().enumerate() {
            if y.is_nan() {
                continue;
            }
            for c in 0..k {
                u[c] = d_inv[(modal[i], c)] * (y - means[c]);
            }
            for a in 0..k {
                for b in 0..k {
                    meat[[a, b]] += u[a] * u[b];
                }
            }
        }
        let mut covariance = meat;
        for a in 0..k {
            for b in 0..k {
                covariance[[a, b]] /= sum_w[a] * sum_w[b];
            }
        }
        for class in 0..k {
            if covariance[[class, class]] <= 0.0 {
                return Err(TestError::DegenerateClass { class });
            }
        }

        let overall = overall_test(&means, &covariance)?;
        let mut pairwise = Vec::with_capacity(k * k.saturating_sub(1) / 2);
        let chi1 = chi_square(1)?;
        for a in 0..k {
            for b in a + 1..k {
                let diff = means[a] - means[b];
                let var = covariance[[a, a]] + covariance[[b, b]] - 2.0 * covariance[[a, b]];
                let stat = if var > 0.0 { diff * diff / var } else { f64::INFINITY };
                let p_value = if stat.is_finite() { 1.0 - chi1.cdf(stat) } else { 0.0 };
                pairwise.push(PairwiseTest {
                    class_a: a,
                    class_b: b,
                    test: ChiSquareTest { stat, df: 1, p_value },
                });
            }
        }

        Ok(BchOutcome { classification_error: d, means, covariance, overall, pairwise, n_used })
    }

    /// `D`, rows true class, columns assigned class.
    pub fn classification_error(&self) -> &Array2<f64> {
        &self.classification_error
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    pub fn std_errors(&self) -> Array1<f64> {
        self.covariance.diag().mapv(f64::sqrt)
    }

    /// Overall test of equal means; `None` for a single class.
    pub fn overall(&self) -> Option<ChiSquareTest> {
        self.overall
    }

    pub fn pairwise(&self) -> &[PairwiseTest] {
        &self.pairwise
    }

    /// Observations with a non-missing auxiliary value.
    pub fn n_used(&self) -> usize {
        self.n_used
    }
}

fn classification_error(probs: &Array2<f64>, modal: &[usize]) -> TestResult<Array2<f64>> {
    let k = probs.ncols();
    let mut d = Array2::<f64>::zeros((k, k));
    for (row, &s) in probs.rows().into_iter().zip(modal) {
        for c in 0..k {
            d[[c, s]] += row[c];
        }
    }
    for (class, mut row) in d.rows_mut().into_iter().enumerate() {
        let total = row.sum();
        if total <= 0.0 {
            return Err(TestError::DegenerateClass { class });
        }
        row /= total;
    }
    Ok(d)
}

/// Wald test on successive differences `μ_c − μ_{c+1}`.
fn overall_test(means: &Array1<f64>, cov: &Array2<f64>) -> TestResult<Option<ChiSquareTest>> {
    let k = means.len();
    if k < 2 {
        return Ok(None);
    }
    let mut contrast = Array2::<f64>::zeros((k - 1, k));
    for r in 0..k - 1 {
        contrast[[r, r]] = 1.0;
        contrast[[r, r + 1]] = -1.0;
    }
    let diff = contrast.dot(means);
    let v = contrast.dot(cov).dot(&contrast.t());
    let v_inv = covariance_from_information(&v, None);
    let stat = diff.dot(&v_inv.dot(&diff));
    let df = k - 1;
    let p_value = 1.0 - chi_square(df)?.cdf(stat);
    Ok(Some(ChiSquareTest { stat, df, p_value }))
}

fn chi_square(df: usize) -> TestResult<ChiSquared> {
    ChiSquared::new(df as f64).map_err(|e| TestError::InvalidDistribution { text: e.to_string() })
}
