//! Starting values for EM — deterministic base starts and seeded random
//! perturbations.
//!
//! Purpose
//! -------
//! Produce the set of [`RandomStart`]s a fit explores. Start 0 is always a
//! deterministic base start; starts `i ≥ 1` perturb the base with a `Pcg64`
//! stream seeded by `seed + i`, so any single start can be reproduced in
//! isolation and a larger budget is a superset of a smaller one.
//!
//! Key behaviors
//! -------------
//! - [`unperturbed`]: class means spread symmetrically over `±1` sample SD
//!   around the sample mean, shared sample variances, thresholds shifted on
//!   the logit scale by the same offsets, equal class proportions.
//! - [`perturbed`]: add `N(0, 1)` noise scaled by the indicator SD to means,
//!   by the perturbation scale to thresholds (re-sorted to stay ordered) and
//!   by half the scale to class intercepts.
//! - [`clustering`]: k-means on standardized complete cases with a
//!   deterministic quantile initialization. When that is degenerate (too
//!   few complete cases, an empty cluster), Ward agglomerative clustering
//!   on mean-imputed data (subsampled to at most [`WARD_MAX_POINTS`]
//!   points) is used instead; if that also fails, the unperturbed start.
//!   The hard partition is turned into parameters with one closed-form
//!   M-step.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every returned start satisfies the `MixtureParams` invariants and the
//!   data layout; class-logit slopes for covariates start at zero.
//! - K = 1 always yields exactly one start.
//!
//! Conventions
//! -----------
//! - Offsets for class `k` are `−1 + 2k/(K − 1)` (zero when K = 1).
//! - Higher classes get *lower* thresholds so that their category mass moves
//!   up, mirroring their higher means.
//! - Fallbacks are logged at `warn` level with the reason.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;
use tracing::warn;

use crate::{
    mixture::{
        core::{
            data::{Indicator, MixtureData},
            mstep::{proportion_logits, update_indicators},
            options::{BaseStart, StartOptions},
            params::{IndicatorParams, MixtureParams, probs_from_thresholds},
            shape::MixtureShape,
        },
        errors::MixtureResult,
    },
    optimization::numerical_stability::safe_logit,
};

/// Largest number of points Ward clustering works on directly.
pub const WARD_MAX_POINTS: usize = 400;

/// Lloyd iteration cap for k-means.
const KMEANS_MAX_ITER: usize = 100;

/// One starting point for EM, owned by a single worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomStart {
    /// Position in the start list; start 0 is the base start.
    pub index: usize,
    /// RNG seed used for the perturbation; `None` for the base start.
    pub seed: Option<u64>,
    pub params: MixtureParams,
}

fn class_offsets(k: usize) -> Vec<f64> {
    if k == 1 {
        return vec![0.0];
    }
    (0..k).map(|c| -1.0 + 2.0 * c as f64 / (k - 1) as f64).collect()
}

/// Deterministic start from sample moments.
pub fn unperturbed(data: &MixtureData, shape: &MixtureShape) -> MixtureResult<MixtureParams> {
    let k = shape.n_classes;
    let offsets = class_offsets(k);
    let mut blocks = Vec::with_capacity(data.n_indicators());
    for (j, ind) in data.indicators.iter().enumerate() {
        match ind {
            Indicator::Continuous { .. } => {
                let (mean, variance) = data
                    .moments(j)
                    .map(|m| (m.mean, m.variance))
                    .unwrap_or((0.0, 1.0));
                let sd = variance.sqrt();
                let means = Array1::from_shape_fn(k, |c| mean + offsets[c] * sd);
                blocks.push(IndicatorParams::Continuous {
                    means,
                    variances: Array1::from_elem(k, variance),
                });
            }
            Indicator::Categorical { levels, .. } => {
                let freqs = data.level_frequencies(j).unwrap_or_default();
                let n_levels = levels.len();
                let mut base_tau = Array1::<f64>::zeros(n_levels - 1);
                let mut cum = 0.0;
                for level in 0..n_levels - 1 {
                    cum += freqs.get(level).copied().unwrap_or(1.0 / n_levels as f64);
                    base_tau[level] = safe_logit(cum);
                }
                let mut probs = Array2::<f64>::zeros((k, n_levels));
                for (c, row) in probs.rows_mut().into_iter().enumerate() {
                    let tau = base_tau.mapv(|t| t - offsets[c]);
                    probs_from_thresholds(tau.view(), row);
                }
                blocks.push(IndicatorParams::Categorical { probs });
            }
        }
    }
    let logits = Array2::<f64>::zeros((k, 1 + data.n_covariates()));
    MixtureParams::new(logits, blocks)
}

/// Perturb `base` with a `Pcg64` stream seeded by `seed`.
pub fn perturbed(
    base: &MixtureParams, data: &MixtureData, scale: f64, seed: u64,
) -> MixtureResult<MixtureParams> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let k = base.n_classes();
    let mut draw = move || -> f64 { StandardNormal.sample(&mut rng) };

    let mut logits = base.logits.clone();
    for c in 0..k - 1 {
        logits[[c, 0]] += 0.5 * scale * draw();
    }

    let mut blocks = Vec::with_capacity(base.indicators.len());
    for (j, block) in base.indicators.iter().enumerate() {
        match block {
            IndicatorParams::Continuous { means, variances } => {
                let sd = data.moments(j).map_or(1.0, |m| m.std_dev());
                let means = means.mapv(|m| m + scale * sd * draw());
                blocks.push(IndicatorParams::Continuous { means, variances: variances.clone() });
            }
            IndicatorParams::Categorical { probs } => {
                let tau = block.thresholds().unwrap_or_else(|| Array2::zeros((k, 0)));
                let mut new_probs = Array2::<f64>::zeros(probs.dim());
                for (row_tau, row) in tau.rows().into_iter().zip(new_probs.rows_mut()) {
                    let mut shifted: Vec<f64> = row_tau.iter().map(|t| t + scale * draw()).collect();
                    shifted.sort_by(f64::total_cmp);
                    probs_from_thresholds(ArrayView1::from(&shifted[..]), row);
                }
                blocks.push(IndicatorParams::Categorical { probs: new_probs });
            }
        }
    }
    MixtureParams::new(logits, blocks)
}

/// Clustering-based start with Ward and unperturbed fallbacks.
pub fn clustering(data: &MixtureData, shape: &MixtureShape) -> MixtureResult<MixtureParams> {
    let k = shape.n_classes;
    if k == 1 {
        return unperturbed(data, shape);
    }
    let standardized = standardize(data);

    let complete = data.complete_rows();
    let kmeans_centroids = if complete.len() >= 2 * k {
        let points = standardized.select(ndarray::Axis(0), &complete);
        kmeans(points.view(), k)
    } else {
        None
    };

    let labels = match kmeans_centroids.and_then(|c| assign_all(standardized.view(), c.view(), k)) {
        Some(labels) => Some(labels),
        None => {
            warn!(
                n_classes = k,
                complete_cases = complete.len(),
                "k-means start degenerate; falling back to Ward clustering"
            );
            let imputed = standardized.mapv(|v| if v.is_nan() { 0.0 } else { v });
            let n = imputed.nrows();
            let sample: Vec<usize> = if n > WARD_MAX_POINTS {
                (0..WARD_MAX_POINTS).map(|s| s * n / WARD_MAX_POINTS).collect()
            } else {
                (0..n).collect()
            };
            let points = imputed.select(ndarray::Axis(0), &sample);
            ward(points.view(), k).and_then(|c| assign_all(imputed.view(), c.view(), k))
        }
    };

    match labels {
        Some(labels) => {
            let mut post = Array2::<f64>::zeros((data.n_obs(), k));
            for (i, &c) in labels.iter().enumerate() {
                post[[i, c]] = 1.0;
            }
            let blocks = update_indicators(post.view(), data, shape)?;
            let logits = proportion_logits(post.view(), 1 + data.n_covariates());
            MixtureParams::new(logits, blocks)
        }
        None => {
            warn!(n_classes = k, "Ward clustering start degenerate; using unperturbed start");
            unperturbed(data, shape)
        }
    }
}

/// Build the full start list for one class count.
///
/// Returns `max(1, initial_starts)` starts (exactly one when K = 1): start 0
/// from the base policy, start `i ≥ 1` perturbed with seed `seed + i`.
pub fn generate_starts(
    data: &MixtureData, shape: &MixtureShape, opts: &StartOptions,
) -> MixtureResult<Vec<RandomStart>> {
    let base = match opts.base {
        BaseStart::Unperturbed => unperturbed(data, shape)?,
        BaseStart::Clustering => clustering(data, shape)?,
    };
    let total = if shape.n_classes == 1 { 1 } else { opts.initial_starts.max(1) };
    let mut starts = Vec::with_capacity(total);
    for index in 1..total {
        let seed = opts.seed.wrapping_add(index as u64);
        let params = perturbed(&base, data, opts.perturbation, seed)?;
        starts.push(RandomStart { index, seed: Some(seed), params });
    }
    starts.insert(0, RandomStart { index: 0, seed: None, params: base });
    Ok(starts)
}

/// Standardize every indicator on its observed original-scale values;
/// missing entries stay `NaN`.
fn standardize(data: &MixtureData) -> Array2<f64> {
    let mut out = data.to_matrix();
    for mut col in out.columns_mut() {
        let observed: Vec<f64> = col.iter().copied().filter(|v| !v.is_nan()).collect();
        let n = observed.len().max(1) as f64;
        let mean = observed.iter().sum::<f64>() / n;
        let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let sd = if var > 0.0 { var.sqrt() } else { 1.0 };
        col.mapv_inplace(|v| (v - mean) / sd);
    }
    out
}

/// Squared distance over the coordinates observed in `x`.
fn partial_sq_dist(x: ArrayView1<'_, f64>, c: ArrayView1<'_, f64>) -> f64 {
    x.iter().zip(c.iter()).filter(|(a, _)| !a.is_nan()).map(|(a, b)| (a - b).powi(2)).sum()
}

fn nearest(x: ArrayView1<'_, f64>, centroids: ArrayView2<'_, f64>) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = partial_sq_dist(x, centroid);
        if d < best_d {
            best_d = d;
            best = c;
        }
    }
    best
}

/// Assign every row to its nearest centroid; `None` if a cluster ends up
/// empty.
fn assign_all(
    points: ArrayView2<'_, f64>, centroids: ArrayView2<'_, f64>, k: usize,
) -> Option<Vec<usize>> {
    let labels: Vec<usize> = points.rows().into_iter().map(|x| nearest(x, centroids)).collect();
    let mut sizes = vec![0usize; k];
    for &c in &labels {
        sizes[c] += 1;
    }
    if sizes.contains(&0) { None } else { Some(labels) }
}

fn centroids_of(points: ArrayView2<'_, f64>, labels: &[usize], k: usize) -> Option<Array2<f64>> {
    let mut sums = Array2::<f64>::zeros((k, points.ncols()));
    let mut sizes = vec![0usize; k];
    for (x, &c) in points.rows().into_iter().zip(labels) {
        let mut row = sums.row_mut(c);
        row += &x;
        sizes[c] += 1;
    }
    if sizes.contains(&0) {
        return None;
    }
    for (mut row, &size) in sums.rows_mut().into_iter().zip(&sizes) {
        row /= size as f64;
    }
    Some(sums)
}

/// Lloyd's k-means on complete rows with deterministic initial centers taken
/// at evenly spaced quantiles of the row sums.
fn kmeans(points: ArrayView2<'_, f64>, k: usize) -> Option<Array2<f64>> {
    let m = points.nrows();
    if m < k {
        return None;
    }
    let mut order: Vec<usize> = (0..m).collect();
    let sums: Vec<f64> = points.rows().into_iter().map(|r| r.sum()).collect();
    order.sort_by(|&a, &b| sums[a].total_cmp(&sums[b]));
    let init: Vec<usize> = (0..k).map(|c| order[((2 * c + 1) * m) / (2 * k)]).collect();
    let mut centroids = points.select(ndarray::Axis(0), &init);

    let mut labels: Vec<usize> = vec![usize::MAX; m];
    for _ in 0..KMEANS_MAX_ITER {
        let next: Vec<usize> =
            points.rows().into_iter().map(|x| nearest(x, centroids.view())).collect();
        if next == labels {
            break;
        }
        labels = next;
        centroids = centroids_of(points, &labels, k)?;
    }
    Some(centroids)
}

/// Ward agglomerative clustering via Lance–Williams updates on squared
/// Euclidean distances, cut at `k` clusters.
fn ward(points: ArrayView2<'_, f64>, k: usize) -> Option<Array2<f64>> {
    let m = points.nrows();
    if m < k {
        return None;
    }
    let mut dist = Array2::<f64>::zeros((m, m));
    for a in 0..m {
        for b in a + 1..m {
            let d = partial_sq_dist(points.row(a), points.row(b));
            dist[[a, b]] = d;
            dist[[b, a]] = d;
        }
    }
    let mut size = vec![1usize; m];
    let mut active = vec![true; m];
    let mut label: Vec<usize> = (0..m).collect();

    for _ in 0..m - k {
        let mut best = (usize::MAX, usize::MAX, f64::INFINITY);
        for a in 0..m {
            if !active[a] {
                continue;
            }
            for b in a + 1..m {
                if active[b] && dist[[a, b]] < best.2 {
                    best = (a, b, dist[[a, b]]);
                }
            }
        }
        let (a, b, d_ab) = best;
        if a == usize::MAX {
            return None;
        }
        let (na, nb) = (size[a] as f64, size[b] as f64);
        for l in 0..m {
            if !active[l] || l == a || l == b {
                continue;
            }
            let nl = size[l] as f64;
            let d = ((na + nl) * dist[[a, l]] + (nb + nl) * dist[[b, l]] - nl * d_ab)
                / (na + nb + nl);
            dist[[a, l]] = d;
            dist[[l, a]] = d;
        }
        size[a] += size[b];
        active[b] = false;
        for lab in label.iter_mut() {
            if *lab == b {
                *lab = a;
            }
        }
    }

    let roots: Vec<usize> = (0..m).filter(|&a| active[a]).collect();
    let labels: Vec<usize> =
        label.iter().map(|l| roots.iter().position(|r| r == l).unwrap_or(0)).collect();
    centroids_of(points, &labels, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::core::{data::IndicatorKind, shape::VarianceStructure};
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Symmetric spread of the unperturbed start.
    // - Reproducibility and superset structure of seeded starts.
    // - Clustering starts, including the Ward fallback.
    // -------------------------------------------------------------------------

    fn two_group_data() -> MixtureData {
        let x = array![
            [0.0, 1.0],
            [0.2, 1.0],
            [-0.1, 1.0],
            [0.1, 2.0],
            [5.0, 3.0],
            [5.2, 3.0],
            [4.9, 3.0],
            [5.1, 2.0]
        ];
        MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Categorical],
            None,
        )
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the unperturbed start spreads means over ±1 SD and orders
    // category mass consistently with the means.
    //
    // Given
    // -----
    // - Two well-separated groups, K = 2.
    //
    // Expect
    // ------
    // - Means at mean ∓ sd; class 1 puts more mass on the top category.
    fn unperturbed_spreads_means_and_shifts_thresholds() {
        // Arrange
        let data = two_group_data();
        let shape = MixtureShape::new(2, VarianceStructure::Equal).unwrap();
        let m = *data.moments(0).unwrap();

        // Act
        let params = unperturbed(&data, &shape).unwrap();

        // Assert
        match &params.indicators[0] {
            IndicatorParams::Continuous { means, .. } => {
                assert_relative_eq!(means[0], m.mean - m.std_dev(), epsilon = 1e-12);
                assert_relative_eq!(means[1], m.mean + m.std_dev(), epsilon = 1e-12);
            }
            _ => panic!("Expected continuous block"),
        }
        match &params.indicators[1] {
            IndicatorParams::Categorical { probs } => assert!(probs[[1, 2]] > probs[[0, 2]]),
            _ => panic!("Expected categorical block"),
        }
        assert!(params.check_layout(&data).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Ensure seeded starts are reproducible and a larger budget extends a
    // smaller one.
    //
    // Given
    // -----
    // - Budgets of 3 and 5 initial starts with the same seed.
    //
    // Expect
    // ------
    // - The first three starts coincide; seeds are `seed + i`; start 0 is
    //   unseeded.
    fn generate_starts_is_reproducible_and_nested() {
        // Arrange
        let data = two_group_data();
        let shape = MixtureShape::new(2, VarianceStructure::Equal).unwrap();
        let small = StartOptions { initial_starts: 3, seed: 11, ..StartOptions::default() };
        let large = StartOptions { initial_starts: 5, ..small };

        // Act
        let a = generate_starts(&data, &shape, &small).unwrap();
        let b = generate_starts(&data, &shape, &large).unwrap();

        // Assert
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 5);
        assert_eq!(a[..], b[..3]);
        assert_eq!(a[0].seed, None);
        assert_eq!(a[2].seed, Some(13));
        assert_ne!(a[1].params, a[0].params);
    }

    #[test]
    // Purpose
    // -------
    // Verify that the clustering start separates two obvious groups.
    //
    // Given
    // -----
    // - Two groups near 0 and 5 on the continuous indicator.
    //
    // Expect
    // ------
    // - Class means close to the group means (in some order).
    fn clustering_recovers_separated_groups() {
        let data = two_group_data();
        let shape = MixtureShape::new(2, VarianceStructure::Equal).unwrap();
        let params = clustering(&data, &shape).unwrap();
        match &params.indicators[0] {
            IndicatorParams::Continuous { means, .. } => {
                let (lo, hi) = if means[0] < means[1] { (means[0], means[1]) } else { (means[1], means[0]) };
                assert_relative_eq!(lo, 0.05, epsilon = 1e-9);
                assert_relative_eq!(hi, 5.05, epsilon = 1e-9);
            }
            _ => panic!("Expected continuous block"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Exercise the Ward fallback when too few complete cases exist for
    // k-means.
    //
    // Given
    // -----
    // - Two indicators where only one row is complete, K = 2.
    //
    // Expect
    // ------
    // - A valid start is still produced and matches the data layout.
    fn clustering_falls_back_when_complete_cases_are_scarce() {
        let x = array![
            [0.0, f64::NAN],
            [0.1, f64::NAN],
            [f64::NAN, 3.0],
            [5.0, 3.1],
            [5.1, f64::NAN],
            [f64::NAN, 0.2]
        ];
        let data = MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Continuous],
            None,
        )
        .unwrap();
        let shape = MixtureShape::new(2, VarianceStructure::Equal).unwrap();
        let params = clustering(&data, &shape).unwrap();
        assert!(params.check_layout(&data).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Verify Ward merging on a tiny configuration with a known answer.
    //
    // Given
    // -----
    // - Points {0, 0.1, 10, 10.2} on a line, cut at two clusters.
    //
    // Expect
    // ------
    // - Centroids 0.05 and 10.1.
    fn ward_merges_nearest_groups_first() {
        let points = array![[0.0], [0.1], [10.0], [10.2]];
        let c = ward(points.view(), 2).unwrap();
        let mut v: Vec<f64> = c.iter().copied().collect();
        v.sort_by(f64::total_cmp);
        assert_relative_eq!(v[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(v[1], 10.1, epsilon = 1e-12);
    }
}
