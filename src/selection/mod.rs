//! selection — choosing the number of classes.
//!
//! Purpose
//! -------
//! Compare fitted mixtures across class counts: information criteria,
//! classification quality and likelihood-ratio tests, assembled into a
//! single comparison table by a parallel sweep.
//!
//! Key behaviors
//! -------------
//! - [`criteria`]: AIC, BIC, adjusted BIC, relative entropy, the
//!   classification-probability matrix and class counts.
//! - [`sweep`]: [`ModelSelector`] fits K = `k_min..=k_max`, runs VLMR / LMR
//!   and, optionally, the bootstrap LRT between neighbouring K, and
//!   returns a [`ModelComparison`].
//!
//! Conventions
//! -----------
//! - Smaller criteria are better; ties go to the smaller K.
//! - Test p-values on a row refer to K − 1 against that row's K.

pub mod criteria;
pub mod sweep;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::criteria::{
    ClassCounts, InformationCriteria, adjusted_bic, aic, bic, classification_matrix, entropy,
};
pub use self::sweep::{ComparisonRow, ModelComparison, ModelSelector, SelectionOptions};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_mixture::selection::prelude::*;
//
// to import the model-selection surface in a single line.

pub mod prelude {
    pub use super::criteria::{ClassCounts, InformationCriteria};
    pub use super::sweep::{ComparisonRow, ModelComparison, ModelSelector, SelectionOptions};
}
