//! Dense feature matrices and training-schema reconciliation

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::error::PipelineError;
use super::schema::{column_f64, column_names, is_numeric, require_columns};

/// Named columns over a dense row-by-feature matrix
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub data: Mat<f64>,
}

impl FeatureMatrix {
    /// Build from every column of `df` except `exclude`. All remaining
    /// columns must be numeric and null-free.
    pub fn from_frame(df: &DataFrame, exclude: &[String]) -> Result<Self> {
        let names: Vec<String> = column_names(df)
            .into_iter()
            .filter(|n| !exclude.contains(n))
            .collect();

        let mut data = Mat::<f64>::zeros(df.height(), names.len());
        for (j, name) in names.iter().enumerate() {
            let column = df.column(name)?;
            if !is_numeric(column.dtype()) {
                return Err(PipelineError::NonNumericFeature {
                    column: name.clone(),
                    dtype: column.dtype().to_string(),
                }
                .into());
            }
            let values = column_f64(df, name)?;
            let nulls = values
                .iter()
                .filter(|v| v.map_or(true, f64::is_nan))
                .count();
            if nulls > 0 {
                return Err(PipelineError::NullsInFeature {
                    column: name.clone(),
                    count: nulls,
                }
                .into());
            }
            for (i, v) in values.into_iter().enumerate() {
                data[(i, j)] = v.unwrap_or_default();
            }
        }

        Ok(Self { names, data })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    /// Copy of the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            data: take_rows(&self.data, indices),
        }
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.nrows()).map(|i| self.data[(i, j)]).collect()
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.ncols()).map(|j| self.data[(i, j)]).collect()
    }
}

/// Copy the given rows of a matrix
pub fn take_rows(data: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), data.ncols(), |i, j| data[(indices[i], j)])
}

/// Subset of a slice at the given indices
pub fn take_values(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

/// The regression target as a dense vector; nulls are an error
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Vec<f64>> {
    require_columns(df, &[target])?;
    let values = column_f64(df, target)?;
    let nulls = values.iter().filter(|v| v.map_or(true, f64::is_nan)).count();
    if nulls > 0 {
        return Err(PipelineError::NullsInFeature {
            column: target.to_string(),
            count: nulls,
        }
        .into());
    }
    Ok(values.into_iter().map(|v| v.unwrap_or_default()).collect())
}

/// What reconciliation changed in a scored table
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Training columns absent from the input, filled with zeros
    pub zero_filled: Vec<String>,
    /// Input columns unknown to the model, dropped
    pub dropped: Vec<String>,
    /// Training columns found in the input
    pub matched: usize,
    pub expected: usize,
}

impl Reconciliation {
    pub fn overlap(&self) -> f64 {
        if self.expected == 0 {
            1.0
        } else {
            self.matched as f64 / self.expected as f64
        }
    }
}

/// Align a table to the training column list: zero-fill absent columns,
/// drop extra ones and order exactly as at training time.
///
/// Fails when fewer than `min_overlap` of the training columns are present,
/// which rejects tables that merely happen to be numeric.
pub fn reconcile_columns(
    df: &DataFrame,
    training_columns: &[String],
    min_overlap: f64,
) -> Result<(DataFrame, Reconciliation)> {
    let available = column_names(df);

    let zero_filled: Vec<String> = training_columns
        .iter()
        .filter(|c| !available.contains(c))
        .cloned()
        .collect();
    let dropped: Vec<String> = available
        .iter()
        .filter(|c| !training_columns.contains(c))
        .cloned()
        .collect();

    let report = Reconciliation {
        matched: training_columns.len() - zero_filled.len(),
        expected: training_columns.len(),
        zero_filled,
        dropped,
    };

    if report.overlap() < min_overlap {
        return Err(PipelineError::SchemaMismatch {
            matched: report.matched,
            expected: report.expected,
            ratio: report.overlap() * 100.0,
            required: min_overlap * 100.0,
        }
        .into());
    }

    let mut out = df.clone();
    for name in &report.zero_filled {
        out.with_column(Column::new(name.as_str().into(), vec![0.0f64; df.height()]))?;
    }
    let out = out.select(training_columns.iter().map(String::as_str))?;

    Ok((out, report))
}
