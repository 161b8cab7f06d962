//! inference::scores — outer product of per-observation scores.
//!
//! For independent observations the covariance of the average score is
//! estimated by the outer-product-of-gradients (OPG) matrix
//! `S = (1/n) Σ_i s_i s_iᵀ = (1/n) SᵀS`, where row `i` of the `n × P` score
//! matrix is `s_i = ∂ℓ_i/∂θ`. `S` is the "meat" of sandwich standard
//! errors and enters Vuong's `W` matrix for the VLMR test.
use ndarray::Array2;

use crate::inference::errors::{InferenceError, InferenceResult};

/// `(1/n) SᵀS` for an `n × P` score matrix.
///
/// # Errors
/// - `EmptyScores` when `n = 0`.
/// - `NonFiniteScore` for the first NaN / infinite entry.
pub fn average_score_covariance(scores: &Array2<f64>) -> InferenceResult<Array2<f64>> {
    let n = scores.nrows();
    if n == 0 {
        return Err(InferenceError::EmptyScores);
    }
    if let Some(((row, col), &value)) = scores.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(InferenceError::NonFiniteScore { row, col, value });
    }
    Ok(scores.t().dot(scores) / n as f64)
}
