//! Indicator data containers for finite mixture models.
//!
//! Purpose
//! -------
//! Provide a validated, immutable container for the observed indicators of a
//! latent class / latent profile analysis, together with optional
//! class-membership covariates. This module centralizes input validation so
//! the E-step, M-step and start generators can assume well-formed columns.
//!
//! Key behaviors
//! -------------
//! - [`MixtureData`] stores one [`Indicator`] per column: continuous columns
//!   keep their raw values (missing as `NaN`), categorical columns are
//!   recoded to 0-based level codes against their sorted distinct values.
//! - Sample moments of continuous indicators are computed once at
//!   construction and reused by start generation and variance floors.
//! - An `n × (1 + Q)` design matrix (intercept plus covariates) is built once
//!   for the class-membership logits.
//!
//! Invariants & assumptions
//! ------------------------
//! - `n_obs > 0` and at least one indicator column.
//! - No observation has every indicator missing.
//! - Non-missing indicator values are finite; `±∞` is rejected.
//! - Continuous indicators have at least two observed values and positive
//!   sample variance; categorical indicators have at least two levels.
//! - Covariates are finite and have exactly `n_obs` rows.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based (observation `i`, indicator `j`, level `c`).
//! - Missing values are `f64::NAN` on input; categorical codes use `None`.
//! - Sample variances use the maximum-likelihood divisor `n_observed`.
//!
//! Downstream usage
//! ----------------
//! - Build via [`MixtureData::new`] from an `n × J` matrix, or through
//!   `RawTable::to_mixture_data` after text loading.
//! - Model code reads indicators directly and never re-validates them.
//!
//! Testing notes
//! -------------
//! - Unit tests cover happy paths (mixed kinds, covariates), level recoding,
//!   and each rejection path.
use crate::mixture::errors::{MixtureError, MixtureResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Measurement scale of an indicator column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    /// Continuous indicator modelled with class-specific Gaussian densities.
    Continuous,
    /// Ordered-categorical indicator modelled with class-specific category
    /// probabilities (thresholds on the logit scale).
    Categorical,
}

/// One observed indicator column.
#[derive(Debug, Clone, PartialEq)]
pub enum Indicator {
    /// Raw values; `NaN` marks a missing entry.
    Continuous { values: Array1<f64> },
    /// Level codes into `levels`; `None` marks a missing entry.
    Categorical { codes: Vec<Option<usize>>, levels: Vec<f64> },
}

impl Indicator {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            Indicator::Continuous { .. } => IndicatorKind::Continuous,
            Indicator::Categorical { .. } => IndicatorKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indicator::Continuous { values } => values.len(),
            Indicator::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of categories (`C`) for categorical indicators, `None` otherwise.
    pub fn n_levels(&self) -> Option<usize> {
        match self {
            Indicator::Continuous { .. } => None,
            Indicator::Categorical { levels, .. } => Some(levels.len()),
        }
    }

    /// Whether observation `i` is missing on this indicator.
    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            Indicator::Continuous { values } => values[i].is_nan(),
            Indicator::Categorical { codes, .. } => codes[i].is_none(),
        }
    }

    /// Value of observation `i` on the original scale (`NaN` when missing).
    pub fn raw_value(&self, i: usize) -> f64 {
        match self {
            Indicator::Continuous { values } => values[i],
            Indicator::Categorical { codes, levels } => match codes[i] {
                Some(c) => levels[c],
                None => f64::NAN,
            },
        }
    }

    /// Number of non-missing observations.
    pub fn n_observed(&self) -> usize {
        match self {
            Indicator::Continuous { values } => values.iter().filter(|v| !v.is_nan()).count(),
            Indicator::Categorical { codes, .. } => codes.iter().filter(|c| c.is_some()).count(),
        }
    }
}

/// Sample moments of a continuous indicator over its observed entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorMoments {
    pub mean: f64,
    /// Maximum-likelihood variance (divisor `n_observed`).
    pub variance: f64,
    pub n_observed: usize,
}

impl IndicatorMoments {
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// `MixtureData` — validated indicators plus optional covariates.
///
/// Fields
/// ------
/// - `names`: indicator names, one per column.
/// - `indicators`: the validated indicator columns.
/// - `covariates`: optional `n × Q` matrix of class-membership covariates.
/// - `covariate_names`: names for the covariate columns (empty when absent).
///
/// Invariants
/// ----------
/// See the module documentation; all of them hold for every value of this
/// type because the only constructors validate their inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureData {
    pub names: Vec<String>,
    pub indicators: Vec<Indicator>,
    pub covariates: Option<Array2<f64>>,
    pub covariate_names: Vec<String>,
    moments: Vec<Option<IndicatorMoments>>,
    design: Array2<f64>,
}

impl MixtureData {
    /// Construct validated mixture data from an `n × J` matrix.
    ///
    /// Parameters
    /// ----------
    /// - `values`: `ArrayView2<f64>`
    ///   Observations in rows, indicators in columns; `NaN` marks missing.
    /// - `kinds`: `&[IndicatorKind]`
    ///   Measurement scale per column (`kinds.len() == J`).
    /// - `names`: `Option<Vec<String>>`
    ///   Column names; defaults to `Y1, Y2, …` when `None`.
    ///
    /// Returns
    /// -------
    /// `MixtureResult<MixtureData>` with categorical columns recoded to level
    /// codes and continuous moments cached.
    ///
    /// Errors
    /// ------
    /// - `EmptyData` / `NoIndicators` for degenerate shapes.
    /// - `RaggedColumns` when `kinds` or `names` have the wrong length.
    /// - `NonFiniteData` for `±∞` entries.
    /// - `AllMissingRow`, `TooFewCategories`, `DegenerateIndicator` per the
    ///   module invariants.
    pub fn new(
        values: ArrayView2<'_, f64>, kinds: &[IndicatorKind], names: Option<Vec<String>>,
    ) -> MixtureResult<Self> {
        let (n, j) = values.dim();
        if n == 0 {
            return Err(MixtureError::EmptyData);
        }
        if j == 0 {
            return Err(MixtureError::NoIndicators);
        }
        if kinds.len() != j {
            return Err(MixtureError::RaggedColumns { expected: j, found: kinds.len() });
        }
        let names = match names {
            Some(names) => names,
            None => (1..=j).map(|c| format!("Y{c}")).collect(),
        };

        let mut indicators = Vec::with_capacity(j);
        for (col, (column, kind)) in values.axis_iter(Axis(1)).zip(kinds).enumerate() {
            for (row, &value) in column.iter().enumerate() {
                if value.is_infinite() {
                    return Err(MixtureError::NonFiniteData { row, col, value });
                }
            }
            indicators.push(match kind {
                IndicatorKind::Continuous => Indicator::Continuous { values: column.to_owned() },
                IndicatorKind::Categorical => recode_categorical(column),
            });
        }
        Self::from_parts(names, indicators, None, Vec::new())
    }

    /// Attach class-membership covariates (`n × Q`, finite, no missing).
    ///
    /// `names` defaults to `X1, X2, …`. An empty `Q = 0` matrix removes
    /// covariates.
    pub fn with_covariates(
        self, covariates: Array2<f64>, names: Option<Vec<String>>,
    ) -> MixtureResult<Self> {
        let q = covariates.ncols();
        let names = match names {
            Some(names) => names,
            None => (1..=q).map(|c| format!("X{c}")).collect(),
        };
        let covariates = if q == 0 { None } else { Some(covariates) };
        Self::from_parts(self.names, self.indicators, covariates, names)
    }

    /// Assemble and validate from already-built columns.
    ///
    /// Used by the public constructors and by the simulator, which keeps the
    /// template's level sets so simulated data share the parameter layout.
    pub(crate) fn from_parts(
        names: Vec<String>, indicators: Vec<Indicator>, covariates: Option<Array2<f64>>,
        covariate_names: Vec<String>,
    ) -> MixtureResult<Self> {
        if indicators.is_empty() {
            return Err(MixtureError::NoIndicators);
        }
        let n = indicators[0].len();
        if n == 0 {
            return Err(MixtureError::EmptyData);
        }
        if names.len() != indicators.len() {
            return Err(MixtureError::RaggedColumns {
                expected: indicators.len(),
                found: names.len(),
            });
        }
        for ind in &indicators {
            if ind.len() != n {
                return Err(MixtureError::RaggedColumns { expected: n, found: ind.len() });
            }
        }

        let mut moments = Vec::with_capacity(indicators.len());
        for (column, ind) in indicators.iter().enumerate() {
            match ind {
                Indicator::Continuous { values } => {
                    let m = continuous_moments(values.view()).ok_or(
                        MixtureError::DegenerateIndicator {
                            column,
                            reason: "fewer than two observed values",
                        },
                    )?;
                    if m.variance <= 0.0 {
                        return Err(MixtureError::DegenerateIndicator {
                            column,
                            reason: "zero sample variance",
                        });
                    }
                    moments.push(Some(m));
                }
                Indicator::Categorical { levels, .. } => {
                    if levels.len() < 2 {
                        return Err(MixtureError::TooFewCategories { column, levels: levels.len() });
                    }
                    moments.push(None);
                }
            }
        }

        for row in 0..n {
            if indicators.iter().all(|ind| ind.is_missing(row)) {
                return Err(MixtureError::AllMissingRow { row });
            }
        }

        let q = covariates.as_ref().map_or(0, |z| z.ncols());
        if covariate_names.len() != q {
            return Err(MixtureError::RaggedColumns { expected: q, found: covariate_names.len() });
        }
        let mut design = Array2::<f64>::ones((n, 1 + q));
        if let Some(z) = &covariates {
            if z.nrows() != n {
                return Err(MixtureError::CovariateRowMismatch { expected: n, found: z.nrows() });
            }
            for ((row, col), &value) in z.indexed_iter() {
                if !value.is_finite() {
                    return Err(MixtureError::NonFiniteCovariate { row, col, value });
                }
                design[[row, col + 1]] = value;
            }
        }

        Ok(MixtureData { names, indicators, covariates, covariate_names, moments, design })
    }

    pub fn n_obs(&self) -> usize {
        self.design.nrows()
    }

    pub fn n_indicators(&self) -> usize {
        self.indicators.len()
    }

    /// Number of class-membership covariates `Q` (excluding the intercept).
    pub fn n_covariates(&self) -> usize {
        self.design.ncols() - 1
    }

    pub fn has_covariates(&self) -> bool {
        self.covariates.is_some()
    }

    /// Value of observation `i` on indicator `j`, original scale, `NaN` if missing.
    pub fn raw_value(&self, i: usize, j: usize) -> f64 {
        self.indicators[j].raw_value(i)
    }

    /// Design matrix `n × (1 + Q)`: a leading column of ones followed by the
    /// covariates.
    pub fn design(&self) -> ArrayView2<'_, f64> {
        self.design.view()
    }

    /// Row `i` of the design matrix, `(1, z_i)`.
    pub fn design_row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.design.row(i)
    }

    /// Sample moments of continuous indicator `j` (`None` for categorical).
    pub fn moments(&self, j: usize) -> Option<&IndicatorMoments> {
        self.moments.get(j).and_then(|m| m.as_ref())
    }

    /// Observed relative frequencies of each level of categorical indicator `j`.
    pub fn level_frequencies(&self, j: usize) -> Option<Vec<f64>> {
        match &self.indicators[j] {
            Indicator::Continuous { .. } => None,
            Indicator::Categorical { codes, levels } => {
                let mut counts = vec![0.0; levels.len()];
                let mut total = 0.0;
                for c in codes.iter().flatten() {
                    counts[*c] += 1.0;
                    total += 1.0;
                }
                Some(counts.into_iter().map(|c| c / total).collect())
            }
        }
    }

    /// Indices of observations with no missing indicator.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.n_obs())
            .filter(|&i| self.indicators.iter().all(|ind| !ind.is_missing(i)))
            .collect()
    }

    /// `n × J` matrix of original-scale values with `NaN` for missing.
    pub fn to_matrix(&self) -> Array2<f64> {
        let n = self.n_obs();
        let j = self.n_indicators();
        Array2::from_shape_fn((n, j), |(i, c)| self.raw_value(i, c))
    }

    /// Copy of this data with the indicator columns replaced, keeping names
    /// and covariates.
    pub(crate) fn with_indicators(&self, indicators: Vec<Indicator>) -> MixtureResult<Self> {
        Self::from_parts(
            self.names.clone(),
            indicators,
            self.covariates.clone(),
            self.covariate_names.clone(),
        )
    }
}

/// Recode a raw column into level codes against its sorted distinct values.
fn recode_categorical(column: ArrayView1<'_, f64>) -> Indicator {
    let mut levels: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    let codes = column
        .iter()
        .map(|&v| if v.is_nan() { None } else { levels.iter().position(|&l| l == v) })
        .collect();
    Indicator::Categorical { codes, levels }
}

fn continuous_moments(values: ArrayView1<'_, f64>) -> Option<IndicatorMoments> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n_observed = observed.len();
    if n_observed < 2 {
        return None;
    }
    let mean = observed.iter().sum::<f64>() / n_observed as f64;
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_observed as f64;
    Some(IndicatorMoments { mean, variance, n_observed })
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
    // - Construction of mixed continuous / categorical data.
    // - Level recoding and missing-value handling.
    // - Covariate attachment and the design matrix.
    // - Each validation failure path.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that mixed indicator data are recoded and summarized correctly.
    //
    // Given
    // -----
    // - A continuous column with one missing value and a categorical column
    //   taking values {3, 1, 2} out of order.
    //
    // Expect
    // ------
    // - Categorical levels are sorted [1, 2, 3] with matching codes.
    // - Continuous moments ignore the missing entry.
    fn new_recodes_levels_and_computes_moments() {
        // Arrange
        let x = array![[1.0, 3.0], [f64::NAN, 1.0], [3.0, 2.0], [5.0, 3.0]];

        // Act
        let data = MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Categorical],
            None,
        )
        .unwrap();

        // Assert
        assert_eq!(data.n_obs(), 4);
        assert_eq!(data.names, vec!["Y1".to_string(), "Y2".to_string()]);
        match &data.indicators[1] {
            Indicator::Categorical { codes, levels } => {
                assert_eq!(levels, &vec![1.0, 2.0, 3.0]);
                assert_eq!(codes, &vec![Some(2), Some(0), Some(1), Some(2)]);
            }
            other => panic!("Expected categorical indicator, got {other:?}"),
        }
        let m = data.moments(0).unwrap();
        assert_eq!(m.n_observed, 3);
        assert_relative_eq!(m.mean, 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.variance, 8.0 / 3.0, epsilon = 1e-12);
        assert!(data.indicators[0].is_missing(1));
        assert_eq!(data.complete_rows(), vec![0, 2, 3]);
        let freqs = data.level_frequencies(1).unwrap();
        assert_relative_eq!(freqs[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Ensure a row with every indicator missing is rejected with its index.
    //
    // Given
    // -----
    // - Row 1 is entirely NaN.
    //
    // Expect
    // ------
    // - `AllMissingRow { row: 1 }`.
    fn new_rejects_all_missing_row() {
        let x = array![[1.0, 0.0], [f64::NAN, f64::NAN], [2.0, 1.0], [3.0, 1.0]];
        let err = MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Categorical],
            None,
        )
        .unwrap_err();
        assert_eq!(err, MixtureError::AllMissingRow { row: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Ensure degenerate columns are rejected before estimation.
    //
    // Given
    // -----
    // - A constant continuous column, and separately a one-level categorical
    //   column.
    //
    // Expect
    // ------
    // - `DegenerateIndicator` and `TooFewCategories` respectively.
    fn new_rejects_degenerate_columns() {
        let constant = array![[2.0], [2.0], [2.0]];
        let err = MixtureData::new(constant.view(), &[IndicatorKind::Continuous], None)
            .unwrap_err();
        assert!(matches!(err, MixtureError::DegenerateIndicator { column: 0, .. }));

        let one_level = array![[1.0], [1.0], [f64::NAN]];
        let err = MixtureData::new(one_level.view(), &[IndicatorKind::Categorical], None)
            .unwrap_err();
        assert_eq!(err, MixtureError::TooFewCategories { column: 0, levels: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Ensure shape mismatches and infinite values are reported.
    //
    // Given
    // -----
    // - One kind for two columns; an infinite entry.
    //
    // Expect
    // ------
    // - `RaggedColumns` and `NonFiniteData` with the offending position.
    fn new_rejects_ragged_kinds_and_infinite_values() {
        let x = array![[1.0, 2.0], [2.0, 3.0]];
        let err = MixtureData::new(x.view(), &[IndicatorKind::Continuous], None).unwrap_err();
        assert_eq!(err, MixtureError::RaggedColumns { expected: 2, found: 1 });

        let y = array![[1.0], [f64::INFINITY], [3.0]];
        let err = MixtureData::new(y.view(), &[IndicatorKind::Continuous], None).unwrap_err();
        assert!(matches!(err, MixtureError::NonFiniteData { row: 1, col: 0, .. }));
    }

    #[test]
    // Purpose
    // -------
    // Verify that covariates are validated and enter the design matrix after
    // the intercept column.
    //
    // Given
    // -----
    // - Three observations and one covariate; then a covariate with a NaN.
    //
    // Expect
    // ------
    // - Design rows equal (1, z_i); the NaN covariate is rejected.
    fn with_covariates_builds_design_and_rejects_missing() {
        // Arrange
        let x = array![[1.0], [2.0], [4.0]];
        let data = MixtureData::new(x.view(), &[IndicatorKind::Continuous], None).unwrap();

        // Act
        let with_z = data.clone().with_covariates(array![[0.5], [-1.0], [2.0]], None).unwrap();
        let bad = data.with_covariates(array![[0.5], [f64::NAN], [2.0]], None);

        // Assert
        assert_eq!(with_z.n_covariates(), 1);
        assert_eq!(with_z.design_row(1).to_vec(), vec![1.0, -1.0]);
        assert_eq!(with_z.covariate_names, vec!["X1".to_string()]);
        assert!(matches!(bad, Err(MixtureError::NonFiniteCovariate { row: 1, col: 0, .. })));
    }
}
