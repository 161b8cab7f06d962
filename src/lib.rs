//! rust_mixture — finite mixture (latent class / latent profile) models with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! mixture estimation and class enumeration to Python via the `_rust_mixture`
//! extension module. When the `python-bindings` feature is enabled, this module
//! defines the Python-facing classes and submodules used by the `rust_mixture`
//! package.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`mixture`, `selection`, `inference`,
//!   `statistical_tests`, `optimization`) as the public crate surface.
//! - Define `#[pyclass]` wrappers and the `#[pymodule]` initializer for the
//!   `_rust_mixture` Python extension.
//! - Create and register the `mixture_models` Python submodule under
//!   `rust_mixture` so that dot-notation imports work as expected.
//!
//! Invariants & assumptions
//! ------------------------
//! - All heavy numerical work is implemented in the inner Rust modules; this
//!   file performs only FFI glue, input validation, and error mapping.
//! - When `python-bindings` is enabled, the Python-visible types mirror the
//!   invariants and signatures of their Rust counterparts (`MixtureModel`,
//!   `ModelSelector`, `BchOutcome`).
//!
//! Conventions
//! -----------
//! - Missing indicator values are passed as `NaN`; class indices reported to
//!   Python are 0-based like the Rust API (the save file alone is 1-based).
//! - Errors from core Rust code are propagated as rich error types internally
//!   and converted to `PyErr` values at the PyO3 boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code should depend directly on the inner modules and can
//!   ignore the PyO3 items guarded by the `python-bindings` feature.
//! - The Python packaging layer imports the `_rust_mixture` module defined
//!   here and wraps its classes in user-facing Python APIs.
//!
//! Testing notes
//! -------------
//! - Core numerical behavior is covered by unit tests in the inner modules and
//!   by the integration tests under `tests/`.
//! - The PyO3 glue is exercised by Python-level smoke tests.

pub mod inference;
pub mod mixture;
pub mod optimization;
pub mod selection;
pub mod statistical_tests;
pub mod utils;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    inference::hessian::VarianceEstimator,
    mixture::{
        core::{data::MixtureData, save::SaveOptions, shape::MixtureShape},
        errors::MixtureError,
        models::mixture::MixtureModel,
    },
    selection::sweep::{ModelSelector, SelectionOptions},
    statistical_tests::{bch::BchOutcome, vlmr::VlmrOptions},
    utils::{extract_auxiliary, extract_fit_options, extract_mixture_data, parse_variances},
};

/// LatentMixture — Python-facing wrapper for a K-class mixture.
///
/// Purpose
/// -------
/// Expose [`MixtureModel`] to Python callers while preserving the core Rust
/// invariants and error handling.
///
/// Key behaviors
/// -------------
/// - Build a model from the class count, variance structure and start / EM
///   settings given as keyword arguments.
/// - `fit` converts indicator (and optional covariate) matrices into
///   [`MixtureData`] and runs the multi-start EM; the data are kept for the
///   inference and save methods.
/// - Property getters expose fit statistics and posterior probabilities.
///
/// Invariants
/// ----------
/// - `data` is `Some` exactly when `inner` has been fitted on it.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_mixture.mixture_models")]
pub struct LatentMixture {
    inner: MixtureModel,
    data: Option<MixtureData>,
}

#[cfg(feature = "python-bindings")]
impl LatentMixture {
    fn fitted(&self) -> PyResult<(&MixtureModel, &MixtureData)> {
        match &self.data {
            Some(data) => Ok((&self.inner, data)),
            None => Err(MixtureError::ModelNotFitted.into()),
        }
    }
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl LatentMixture {
    #[new]
    #[pyo3(
        signature = (
            n_classes,
            variances = None,
            starts = None,
            initial_iterations = None,
            seed = None,
            max_iter = None,
            tol = None,
            workers = None,
        ),
        text_signature = "(n_classes, /, variances='equal', starts=(20, 4), \
                          initial_iterations=10, seed=0, max_iter=500, tol=1e-7, workers=None)"
    )]
    pub fn new(
        n_classes: usize, variances: Option<&str>, starts: Option<(usize, usize)>,
        initial_iterations: Option<usize>, seed: Option<u64>, max_iter: Option<usize>,
        tol: Option<f64>, workers: Option<usize>,
    ) -> PyResult<Self> {
        let shape = MixtureShape::new(n_classes, parse_variances(variances)?)?;
        let options =
            extract_fit_options(starts, initial_iterations, seed, max_iter, tol, workers)?;
        Ok(LatentMixture { inner: MixtureModel::new(shape, options), data: None })
    }

    #[pyo3(
        signature = (indicators, kinds = None, names = None, covariates = None),
        text_signature = "(self, indicators, /, kinds=None, names=None, covariates=None)"
    )]
    pub fn fit<'py>(
        &mut self, py: Python<'py>, indicators: &Bound<'py, PyAny>, kinds: Option<Vec<String>>,
        names: Option<Vec<String>>, covariates: Option<&Bound<'py, PyAny>>,
    ) -> PyResult<()> {
        let data = extract_mixture_data(indicators, kinds, names, covariates)?;
        let model = &mut self.inner;
        py.allow_threads(|| model.fit(&data).map(|_| ()))?;
        self.data = Some(data);
        Ok(())
    }

    #[getter]
    pub fn loglik(&self) -> PyResult<f64> {
        Ok(self.inner.result()?.loglik)
    }

    #[getter]
    pub fn n_params(&self) -> PyResult<usize> {
        Ok(self.inner.result()?.n_params)
    }

    #[getter]
    pub fn aic(&self) -> PyResult<f64> {
        Ok(self.inner.result()?.aic)
    }

    #[getter]
    pub fn bic(&self) -> PyResult<f64> {
        Ok(self.inner.result()?.bic)
    }

    #[getter]
    pub fn adjusted_bic(&self) -> PyResult<f64> {
        Ok(self.inner.result()?.adjusted_bic)
    }

    #[getter]
    pub fn entropy(&self) -> PyResult<f64> {
        Ok(self.inner.result()?.entropy)
    }

    #[getter]
    pub fn converged(&self) -> PyResult<bool> {
        Ok(self.inner.result()?.converged)
    }

    #[getter]
    pub fn replicated(&self) -> PyResult<bool> {
        Ok(self.inner.result()?.replicated)
    }

    /// Mean model-estimated class proportions, canonical order.
    #[getter]
    pub fn proportions(&self) -> PyResult<Vec<f64>> {
        let (model, data) = self.fitted()?;
        Ok(model.params()?.mean_proportions(data).to_vec())
    }

    /// Posterior class probabilities, one row per observation.
    #[getter]
    pub fn posterior(&self) -> PyResult<Vec<Vec<f64>>> {
        let post = self.inner.posterior()?;
        Ok(post.probs().rows().into_iter().map(|r| r.to_vec()).collect())
    }

    /// Most likely class per observation (0-based).
    #[getter]
    pub fn modal_classes(&self) -> PyResult<Vec<usize>> {
        Ok(self.inner.posterior()?.modal_classes())
    }

    /// Parameter table rows `(label, class, estimate, se, z, p)` and the
    /// information condition number.
    #[pyo3(signature = (robust = true), text_signature = "(self, /, robust=True)")]
    #[allow(clippy::type_complexity)]
    pub fn parameter_estimates(
        &self, robust: bool,
    ) -> PyResult<(Vec<(String, Option<usize>, f64, f64, Option<f64>, Option<f64>)>, f64)> {
        let (model, data) = self.fitted()?;
        let estimator = if robust { VarianceEstimator::Mlr } else { VarianceEstimator::Ml };
        let table = model.parameter_estimates(data, estimator)?;
        let rows = table
            .rows
            .into_iter()
            .map(|r| (r.label, r.class, r.estimate, r.std_error, r.z, r.p_value))
            .collect();
        Ok((rows, table.condition_number))
    }

    /// Fixed-width save text: indicators, posterior probabilities, class.
    #[pyo3(
        signature = (width = 10, precision = 3, header = false),
        text_signature = "(self, /, width=10, precision=3, header=False)"
    )]
    pub fn save_data(&self, width: usize, precision: usize, header: bool) -> PyResult<String> {
        let (model, data) = self.fitted()?;
        let opts = SaveOptions::new(width, precision, header, "*".to_string())?;
        Ok(model.save_data(data, &opts)?)
    }

    /// BCH class means of an auxiliary variable: `(means, std_errors,
    /// overall_p)`.
    pub fn bch<'py>(
        &self, py: Python<'py>, auxiliary: &Bound<'py, PyAny>,
    ) -> PyResult<(Vec<f64>, Vec<f64>, Option<f64>)> {
        let (model, _) = self.fitted()?;
        let aux = extract_auxiliary(py, auxiliary)?;
        let out = BchOutcome::bch(model.posterior()?, aux.view())?;
        Ok((out.means().to_vec(), out.std_errors().to_vec(), out.overall().map(|t| t.p_value)))
    }
}

/// compare_classes — fit K = k_min..=k_max and return one row per K.
///
/// Rows are `(k, loglik, n_params, aic, bic, adjusted_bic, entropy, vlmr_p,
/// lmr_p, converged, replicated)`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(
    signature = (indicators, k_min = 1, k_max = 4, kinds = None, variances = None, seed = None, workers = None),
    text_signature = "(indicators, /, k_min=1, k_max=4, kinds=None, variances='equal', seed=0, workers=None)"
)]
#[allow(clippy::type_complexity)]
pub fn compare_classes<'py>(
    py: Python<'py>, indicators: &Bound<'py, PyAny>, k_min: usize, k_max: usize,
    kinds: Option<Vec<String>>, variances: Option<&str>, seed: Option<u64>,
    workers: Option<usize>,
) -> PyResult<
    Vec<(usize, f64, usize, f64, f64, f64, f64, Option<f64>, Option<f64>, bool, bool)>,
> {
    let data = extract_mixture_data(indicators, kinds, None, None)?;
    let fit = extract_fit_options(None, None, seed, None, None, workers)?;
    let opts = SelectionOptions::new(
        k_min,
        k_max,
        parse_variances(variances)?,
        fit,
        Some(VlmrOptions::default()),
        None,
    )?;
    let cmp = py.allow_threads(|| ModelSelector::new(opts).run(&data))?;
    Ok(cmp
        .rows
        .into_iter()
        .map(|r| {
            (
                r.n_classes,
                r.loglik,
                r.n_params,
                r.aic,
                r.bic,
                r.adjusted_bic,
                r.entropy,
                r.vlmr_p,
                r.lmr_p,
                r.converged,
                r.replicated,
            )
        })
        .collect())
}

/// _rust_mixture — PyO3 module initializer for the Python extension.
///
/// Purpose
/// -------
/// Define the `_rust_mixture` Python module and register the
/// `mixture_models` submodule used by the public `rust_mixture` package.
///
/// Errors
/// ------
/// - `PyErr`
///   If creating the submodule or manipulating `sys.modules` fails.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_mixture<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let mixture_models_mod = PyModule::new(_py, "mixture_models")?;
    mixture_models(_py, m, &mixture_models_mod)?;

    // Manually add the submodule into sys.modules to allow for dot notation.
    _py.import("sys")?
        .getattr("modules")?
        .set_item("rust_mixture.mixture_models", mixture_models_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn mixture_models<'py>(
    _py: Python, rust_mixture: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<LatentMixture>()?;
    m.add_function(wrap_pyfunction!(compare_classes, m)?)?;
    rust_mixture.add_submodule(m)?;
    Ok(())
}
