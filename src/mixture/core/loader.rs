//! Text loader for rectangular numeric data.
//!
//! Purpose
//! -------
//! Parse free-format (whitespace-separated) or single-character-delimited
//! numeric tables into a [`RawTable`] of named columns, then select
//! indicator and covariate columns by name to build [`MixtureData`].
//!
//! Key behaviors
//! -------------
//! - Variable names are declared up front; every data line must have exactly
//!   that many fields.
//! - A configurable missing-value token (default `.`) maps to `NaN`. With a
//!   character delimiter, an empty field is also treated as missing.
//! - Blank lines and lines whose first non-blank character is `#` are
//!   skipped.
//! - Malformed tokens and wrong field counts are fatal and report the 1-based
//!   line number, so input problems surface before any estimation.
//!
//! Conventions
//! -----------
//! - Line numbers and field numbers in errors are 1-based.
//! - Tokens that parse to non-finite numbers (`inf`, `NaN`) are malformed;
//!   missingness is expressed only through the missing token.
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::mixture::{
    core::data::{IndicatorKind, MixtureData},
    errors::{MixtureError, MixtureResult},
};

/// Field separator used by [`DataLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Any run of whitespace separates fields (free format).
    Whitespace,
    /// A single character separates fields; surrounding whitespace is trimmed.
    Char(char),
}

/// Builder-style configuration for reading a data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLoader {
    names: Vec<String>,
    delimiter: Delimiter,
    missing_token: String,
}

impl DataLoader {
    /// Declare the variables present in every data line, in order.
    ///
    /// # Errors
    /// - `NoIndicators` when `names` is empty.
    /// - `DuplicateVariable` when a name appears twice.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> MixtureResult<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(MixtureError::NoIndicators);
        }
        check_unique(&names)?;
        Ok(DataLoader { names, delimiter: Delimiter::Whitespace, missing_token: ".".to_string() })
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_missing_token(mut self, token: impl Into<String>) -> Self {
        self.missing_token = token.into();
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Parse an in-memory table.
    pub fn load_str(&self, text: &str) -> MixtureResult<RawTable> {
        self.load_reader(text.as_bytes())
    }

    /// Parse a file from disk.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> MixtureResult<RawTable> {
        let file = File::open(path.as_ref())?;
        self.load_reader(BufReader::new(file))
    }

    /// Parse any buffered reader, line by line.
    pub fn load_reader<R: BufRead>(&self, reader: R) -> MixtureResult<RawTable> {
        let width = self.names.len();
        let mut flat: Vec<f64> = Vec::new();
        let mut rows = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = match self.delimiter {
                Delimiter::Whitespace => trimmed.split_whitespace().collect(),
                Delimiter::Char(c) => trimmed.split(c).map(str::trim).collect(),
            };
            if fields.len() != width {
                return Err(MixtureError::WrongColumnCount {
                    line: line_no,
                    expected: width,
                    found: fields.len(),
                });
            }
            for (col, token) in fields.iter().enumerate() {
                flat.push(self.parse_token(token, line_no, col + 1)?);
            }
            rows += 1;
        }

        if rows == 0 {
            return Err(MixtureError::EmptyData);
        }
        let values = Array2::from_shape_vec((rows, width), flat)
            .map_err(|e| MixtureError::Io { text: e.to_string() })?;
        debug!(rows, columns = width, "loaded data table");
        Ok(RawTable { names: self.names.clone(), values })
    }

    fn parse_token(&self, token: &str, line: usize, column: usize) -> MixtureResult<f64> {
        if token == self.missing_token || token.is_empty() {
            return Ok(f64::NAN);
        }
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(MixtureError::MalformedValue { line, column, token: token.to_string() }),
        }
    }
}

/// Parsed table of named numeric columns (`NaN` = missing).
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl RawTable {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    fn index_of(&self, name: &str) -> MixtureResult<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| MixtureError::UnknownVariable { name: name.to_string() })
    }

    /// View of a single column by name.
    pub fn column(&self, name: &str) -> MixtureResult<ArrayView1<'_, f64>> {
        Ok(self.values.column(self.index_of(name)?))
    }

    /// Copy the named columns, in the requested order, into a new matrix.
    pub fn select(&self, names: &[&str]) -> MixtureResult<Array2<f64>> {
        check_unique(names)?;
        let idx = names.iter().map(|n| self.index_of(n)).collect::<MixtureResult<Vec<_>>>()?;
        let mut out = Array2::<f64>::zeros((self.n_rows(), idx.len()));
        for (dst, &src) in idx.iter().enumerate() {
            out.column_mut(dst).assign(&self.values.column(src));
        }
        Ok(out)
    }

    /// Build validated [`MixtureData`] from named indicator and covariate
    /// columns.
    ///
    /// # Errors
    /// - `UnknownVariable` / `DuplicateVariable` for bad selections (a name
    ///   used both as indicator and covariate counts as a duplicate).
    /// - Any validation error of [`MixtureData::new`] and
    ///   [`MixtureData::with_covariates`].
    pub fn to_mixture_data(
        &self, indicators: &[(&str, IndicatorKind)], covariates: &[&str],
    ) -> MixtureResult<MixtureData> {
        let ind_names: Vec<&str> = indicators.iter().map(|(n, _)| *n).collect();
        let all: Vec<&str> = ind_names.iter().chain(covariates.iter()).copied().collect();
        check_unique(&all)?;

        let kinds: Vec<IndicatorKind> = indicators.iter().map(|(_, k)| *k).collect();
        let y = self.select(&ind_names)?;
        let data = MixtureData::new(
            y.view(),
            &kinds,
            Some(ind_names.iter().map(|s| s.to_string()).collect()),
        )?;
        if covariates.is_empty() {
            return Ok(data);
        }
        let z = self.select(covariates)?;
        data.with_covariates(z, Some(covariates.iter().map(|s| s.to_string()).collect()))
    }
}

fn check_unique<S: AsRef<str>>(names: &[S]) -> MixtureResult<()> {
    for (i, a) in names.iter().enumerate() {
        if names[..i].iter().any(|b| b.as_ref() == a.as_ref()) {
            return Err(MixtureError::DuplicateVariable { name: a.as_ref().to_string() });
        }
    }
    Ok(())
}
