//! Model shape for K-class mixtures.
//!
//! A shape fixes the number of latent classes `K` and whether continuous
//! indicators share one variance across classes or get one per class. The
//! number of free parameters follows from the shape and a data layout:
//!
//! - `(K − 1)(1 + Q)` class logits (last class is the reference);
//! - per continuous indicator, `K` means plus `1` (equal) or `K` (varying)
//!   variances;
//! - per categorical indicator with `C` levels, `K(C − 1)` thresholds.
use crate::mixture::{
    core::data::{Indicator, MixtureData},
    errors::{MixtureError, MixtureResult},
};

/// Variance structure for continuous indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarianceStructure {
    /// One variance per indicator, shared across classes.
    #[default]
    Equal,
    /// One variance per indicator and class.
    Varying,
}

impl VarianceStructure {
    /// Number of variance parameters per continuous indicator.
    pub fn n_variances(&self, n_classes: usize) -> usize {
        match self {
            VarianceStructure::Equal => 1,
            VarianceStructure::Varying => n_classes,
        }
    }
}

/// Number of classes and variance structure of a mixture model.
///
/// Invariant: `n_classes ≥ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixtureShape {
    pub n_classes: usize,
    pub variances: VarianceStructure,
}

impl MixtureShape {
    /// Construct a validated [`MixtureShape`].
    ///
    /// # Errors
    /// - [`MixtureError::InvalidClassCount`] if `n_classes == 0`.
    pub fn new(n_classes: usize, variances: VarianceStructure) -> MixtureResult<Self> {
        if n_classes == 0 {
            return Err(MixtureError::InvalidClassCount {
                k: n_classes,
                reason: "at least one latent class is required.",
            });
        }
        Ok(MixtureShape { n_classes, variances })
    }

    /// Check that the model is estimable on `data`: fewer classes than
    /// observations.
    pub fn check_data(&self, data: &MixtureData) -> MixtureResult<()> {
        if self.n_classes >= data.n_obs() {
            return Err(MixtureError::InvalidClassCount {
                k: self.n_classes,
                reason: "number of classes must be less than the number of observations.",
            });
        }
        Ok(())
    }

    /// Number of class-logit parameters, `(K − 1)(1 + Q)`.
    pub fn n_logit_params(&self, data: &MixtureData) -> usize {
        (self.n_classes - 1) * (1 + data.n_covariates())
    }

    /// Total number of free parameters for this shape on `data`.
    pub fn n_free_params(&self, data: &MixtureData) -> usize {
        let k = self.n_classes;
        let indicator_params: usize = data
            .indicators
            .iter()
            .map(|ind| match ind {
                Indicator::Continuous { .. } => k + self.variances.n_variances(k),
                Indicator::Categorical { levels, .. } => k * (levels.len() - 1),
            })
            .sum();
        self.n_logit_params(data) + indicator_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::core::data::IndicatorKind;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify the free-parameter count on a mixed layout with a covariate.
    //
    // Given
    // -----
    // - One continuous and one 3-level categorical indicator, one covariate,
    //   K = 3.
    //
    // Expect
    // ------
    // - Equal variances: 2·2 logits + (3 + 1) + 3·2 = 14.
    // - Varying variances: 16.
    fn n_free_params_counts_every_block() {
        // Arrange
        let x = array![[0.1, 1.0], [0.5, 2.0], [1.2, 3.0], [2.0, 1.0], [0.3, 2.0]];
        let data = MixtureData::new(
            x.view(),
            &[IndicatorKind::Continuous, IndicatorKind::Categorical],
            None,
        )
        .unwrap()
        .with_covariates(array![[0.0], [1.0], [0.0], [1.0], [1.0]], None)
        .unwrap();

        // Act
        let equal = MixtureShape::new(3, VarianceStructure::Equal).unwrap();
        let varying = MixtureShape::new(3, VarianceStructure::Varying).unwrap();

        // Assert
        assert_eq!(equal.n_free_params(&data), 14);
        assert_eq!(varying.n_free_params(&data), 16);
        assert_eq!(equal.n_logit_params(&data), 4);
    }

    #[test]
    // Purpose
    // -------
    // Ensure zero classes and K ≥ n are rejected.
    //
    // Given
    // -----
    // - K = 0; K = 3 on three observations.
    //
    // Expect
    // ------
    // - `InvalidClassCount` in both cases.
    fn new_and_check_data_reject_invalid_class_counts() {
        assert!(matches!(
            MixtureShape::new(0, VarianceStructure::Equal),
            Err(MixtureError::InvalidClassCount { k: 0, .. })
        ));
        let x = array![[0.0], [1.0], [2.0]];
        let data = MixtureData::new(x.view(), &[IndicatorKind::Continuous], None).unwrap();
        let shape = MixtureShape::new(3, VarianceStructure::Equal).unwrap();
        assert!(shape.check_data(&data).is_err());
    }
}
