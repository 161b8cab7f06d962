//! Closed-form M-step updates.
//!
//! Given posterior weights `γ_ik`, update the class-conditional indicator
//! parameters and, without covariates, the class proportions:
//!
//! - means `μ_kj = Σ_i γ_ik y_ij / Σ_i γ_ik` over observed `y_ij`;
//! - variances per class, or pooled across classes under
//!   [`VarianceStructure::Equal`], floored at
//!   `VARIANCE_FLOOR_RATIO · s²_j`;
//! - category probabilities as posterior-weighted frequencies, floored at
//!   `PROB_FLOOR` and renormalized;
//! - proportions `π_k = Σ_i γ_ik / n`, returned as reference-coded logits.
//!
//! Classes with (numerically) zero posterior mass on an indicator keep the
//! sample mean / variance / frequencies so the update stays defined.
use ndarray::{Array1, Array2, ArrayView2};

use crate::{
    mixture::{
        core::{
            data::{Indicator, MixtureData},
            params::IndicatorParams,
            shape::{MixtureShape, VarianceStructure},
        },
        errors::{MixtureError, MixtureResult},
    },
    optimization::numerical_stability::{
        GENERAL_TOL, PROB_FLOOR, VARIANCE_FLOOR_RATIO, floor_and_normalize,
    },
};

/// Update every indicator block from the posterior weights `post` (`n × K`).
pub fn update_indicators(
    post: ArrayView2<'_, f64>, data: &MixtureData, shape: &MixtureShape,
) -> MixtureResult<Vec<IndicatorParams>> {
    let k = shape.n_classes;
    if post.dim() != (data.n_obs(), k) {
        return Err(MixtureError::LayoutMismatch { reason: "posterior weights have the wrong shape" });
    }
    let mut blocks = Vec::with_capacity(data.n_indicators());
    for (j, ind) in data.indicators.iter().enumerate() {
        match ind {
            Indicator::Continuous { values } => {
                let moments = data.moments(j).ok_or(MixtureError::LayoutMismatch {
                    reason: "missing moments for a continuous indicator",
                })?;
                let floor = VARIANCE_FLOOR_RATIO * moments.variance;

                let mut weight = Array1::<f64>::zeros(k);
                let mut sum = Array1::<f64>::zeros(k);
                for (i, &y) in values.iter().enumerate() {
                    if y.is_nan() {
                        continue;
                    }
                    for c in 0..k {
                        weight[c] += post[[i, c]];
                        sum[c] += post[[i, c]] * y;
                    }
                }
                let means = Array1::from_shape_fn(k, |c| {
                    if weight[c] > GENERAL_TOL { sum[c] / weight[c] } else { moments.mean }
                });

                let mut sq = Array1::<f64>::zeros(k);
                for (i, &y) in values.iter().enumerate() {
                    if y.is_nan() {
                        continue;
                    }
                    for c in 0..k {
                        sq[c] += post[[i, c]] * (y - means[c]).powi(2);
                    }
                }
                let variances = match shape.variances {
                    VarianceStructure::Equal => {
                        let total_w = weight.sum();
                        let pooled =
                            if total_w > GENERAL_TOL { sq.sum() / total_w } else { moments.variance };
                        Array1::from_elem(k, pooled.max(floor))
                    }
                    VarianceStructure::Varying => Array1::from_shape_fn(k, |c| {
                        let v = if weight[c] > GENERAL_TOL { sq[c] / weight[c] } else { moments.variance };
                        v.max(floor)
                    }),
                };
                blocks.push(IndicatorParams::Continuous { means, variances });
            }
            Indicator::Categorical { codes, levels } => {
                let n_levels = levels.len();
                let mut counts = Array2::<f64>::zeros((k, n_levels));
                for (i, code) in codes.iter().enumerate() {
                    if let Some(level) = *code {
                        for c in 0..k {
                            counts[[c, level]] += post[[i, c]];
                        }
                    }
                }
                let fallback = data.level_frequencies(j).unwrap_or_default();
                for mut row in counts.rows_mut() {
                    let total = row.sum();
                    if total > GENERAL_TOL {
                        row.mapv_inplace(|v| v / total);
                    } else {
                        for (level, v) in row.iter_mut().enumerate() {
                            *v = fallback.get(level).copied().unwrap_or(1.0 / n_levels as f64);
                        }
                    }
                    floor_and_normalize(row);
                }
                blocks.push(IndicatorParams::Categorical { probs: counts });
            }
        }
    }
    Ok(blocks)
}

/// Reference-coded logits `K × width` from posterior class sizes; covariate
/// columns are zero.
pub fn proportion_logits(post: ArrayView2<'_, f64>, width: usize) -> Array2<f64> {
    let (n, k) = post.dim();
    let mut props = Array1::from_shape_fn(k, |c| post.column(c).sum() / n as f64);
    props.mapv_inplace(|p| p.max(PROB_FLOOR));
    let reference = props[k - 1].ln();
    let mut logits = Array2::<f64>::zeros((k, width));
    for c in 0..k {
        logits[[c, 0]] = props[c].ln() - reference;
    }
    logits
}
