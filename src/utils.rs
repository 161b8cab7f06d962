//! utils — conversion helpers for the Python bindings.
//!
//! Extract numpy / pandas / sequence inputs into `ndarray` containers and
//! build validated option structs from keyword arguments. Everything here
//! is compiled only with the `python-bindings` feature.
#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    mixture::core::{
        data::{IndicatorKind, MixtureData},
        options::{EMOptions, EMTolerances, FitOptions, StartOptions},
        shape::VarianceStructure,
    },
    optimization::loglik_optimizer::MLEOptions,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1, PyReadonlyArray2,
};

/// One-dimensional float64 input from an ndarray, a pandas Series or a
/// Python sequence.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64",
        )
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Two-dimensional float64 input (`n × J`) from an ndarray, a pandas
/// DataFrame or a list of rows. `NaN` marks missing values.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(raw_data: &Bound<'py, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro.as_array().to_owned());
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or list of float64 rows",
        )
    })?;
    let n = rows.len();
    let j = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != j) {
        return Err(PyValueError::new_err("all rows must have the same length"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, j), flat).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Build [`MixtureData`] from indicator and optional covariate matrices.
///
/// `kinds` holds one of `"continuous"` / `"categorical"` per column; when
/// omitted every column is continuous.
#[cfg(feature = "python-bindings")]
pub fn extract_mixture_data<'py>(
    indicators: &Bound<'py, PyAny>, kinds: Option<Vec<String>>, names: Option<Vec<String>>,
    covariates: Option<&Bound<'py, PyAny>>,
) -> PyResult<MixtureData> {
    let values = extract_f64_matrix(indicators)?;
    let kinds = match kinds {
        Some(kinds) => kinds.iter().map(|k| parse_kind(k)).collect::<PyResult<Vec<_>>>()?,
        None => vec![IndicatorKind::Continuous; values.ncols()],
    };
    let data = MixtureData::new(values.view(), &kinds, names)?;
    match covariates {
        Some(cov) => Ok(data.with_covariates(extract_f64_matrix(cov)?, None)?),
        None => Ok(data),
    }
}

/// Auxiliary variable for BCH (`NaN` for missing).
#[cfg(feature = "python-bindings")]
pub fn extract_auxiliary<'py>(py: Python<'py>, raw: &Bound<'py, PyAny>) -> PyResult<Array1<f64>> {
    let arr = extract_f64_array(py, raw)?;
    let slice = arr
        .as_slice()
        .map_err(|_| PyValueError::new_err("auxiliary must be a 1-D contiguous float64 array"))?;
    Ok(Array1::from(slice.to_vec()))
}

#[cfg(feature = "python-bindings")]
fn parse_kind(kind: &str) -> PyResult<IndicatorKind> {
    match kind.to_lowercase().as_str() {
        "continuous" | "c" => Ok(IndicatorKind::Continuous),
        "categorical" | "u" => Ok(IndicatorKind::Categorical),
        other => Err(PyValueError::new_err(format!(
            "unknown indicator kind '{other}'; expected 'continuous' or 'categorical'"
        ))),
    }
}

#[cfg(feature = "python-bindings")]
pub fn parse_variances(variances: Option<&str>) -> PyResult<VarianceStructure> {
    match variances.map(str::to_lowercase).as_deref() {
        None | Some("equal") => Ok(VarianceStructure::Equal),
        Some("varying") => Ok(VarianceStructure::Varying),
        Some(other) => Err(PyValueError::new_err(format!(
            "unknown variance structure '{other}'; expected 'equal' or 'varying'"
        ))),
    }
}

/// Fit options from keyword arguments, defaulting each field.
#[cfg(feature = "python-bindings")]
pub fn extract_fit_options(
    starts: Option<(usize, usize)>, initial_iterations: Option<usize>, seed: Option<u64>,
    max_iter: Option<usize>, tol: Option<f64>, workers: Option<usize>,
) -> PyResult<FitOptions> {
    let base_starts = StartOptions::default();
    let (initial, finals) =
        starts.unwrap_or((base_starts.initial_starts, base_starts.final_starts));
    let start_opts = StartOptions::new(
        initial,
        finals,
        initial_iterations.unwrap_or(base_starts.initial_iterations),
        seed.unwrap_or(base_starts.seed),
        base_starts.perturbation,
        base_starts.base,
    )?;
    let base_tols = EMTolerances::default();
    let tols = EMTolerances::new(
        tol.unwrap_or(base_tols.loglik_abs),
        tol.unwrap_or(base_tols.loglik_rel),
        max_iter.unwrap_or(base_tols.max_iter),
    )?;
    let em = EMOptions::new(tols, MLEOptions::default());
    Ok(FitOptions::new(em, start_opts, FitOptions::default().replication_tol, workers)?)
}
