//! Missing value imputation
//!
//! Numeric columns are filled jointly by nearest-neighbour imputation, so a
//! missing budget is estimated from the budgets of rows that look similar on
//! every other listed column. Categorical columns are filled with their mode
//! or a constant placeholder.

use std::collections::BTreeMap;

use anyhow::Result;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::schema::{
    column_f64, column_names, column_strings, is_categorical, is_numeric, MovieSchema,
};

/// Placeholder written into categorical cells with no better estimate
pub const UNKNOWN: &str = "Unknown";

/// How the k nearest donors are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Weighting {
    /// Plain mean of the donors
    Uniform,
    /// Inverse-distance weighted mean; zero-distance donors take all the weight
    #[default]
    Distance,
}

impl std::fmt::Display for Weighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Weighting::Uniform => write!(f, "uniform"),
            Weighting::Distance => write!(f, "distance"),
        }
    }
}

impl std::str::FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(Weighting::Uniform),
            "distance" => Ok(Weighting::Distance),
            _ => Err(format!(
                "Unknown weighting: '{}'. Use 'uniform' or 'distance'.",
                s
            )),
        }
    }
}

/// Nearest-neighbour imputer over a fixed set of numeric columns
#[derive(Debug, Clone)]
pub struct KnnImputer {
    pub n_neighbors: usize,
    pub weighting: Weighting,
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weighting: Weighting::Distance,
        }
    }
}

/// NaN-aware Euclidean distance between two rows.
///
/// Only coordinates present in both rows contribute; the sum is scaled up by
/// `total / present` so rows with fewer shared coordinates are comparable.
/// Returns `None` when the rows share no coordinate.
fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut present = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            let d = x - y;
            sum += d * d;
            present += 1;
        }
    }
    if present == 0 {
        return None;
    }
    Some((sum * a.len() as f64 / present as f64).sqrt())
}

impl KnnImputer {
    pub fn new(n_neighbors: usize, weighting: Weighting) -> Self {
        Self {
            n_neighbors,
            weighting,
        }
    }

    /// Impute a row-major block of values.
    ///
    /// Every returned value is either an observed value or a convex
    /// combination of observed values of the same column.
    pub fn impute_rows(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>> {
        if self.n_neighbors == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_neighbors",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if rows.is_empty() {
            return Err(PipelineError::EmptyTable {
                stage: "nearest-neighbour imputation",
            }
            .into());
        }

        let n_cols = rows[0].len();
        let mut means = Vec::with_capacity(n_cols);
        for j in 0..n_cols {
            let observed: Vec<f64> = rows.iter().filter_map(|r| r[j]).collect();
            if observed.is_empty() {
                // Caller maps the index back to a column name
                return Err(PipelineError::AllMissing {
                    column: j.to_string(),
                }
                .into());
            }
            means.push(observed.iter().sum::<f64>() / observed.len() as f64);
        }

        let imputed = rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| {
                if row.iter().all(Option::is_some) {
                    return row.iter().map(|v| v.unwrap_or_default()).collect();
                }

                // Distances to every other row, computed once per receiver
                let distances: Vec<Option<f64>> = rows
                    .iter()
                    .enumerate()
                    .map(|(k, other)| {
                        if k == i {
                            None
                        } else {
                            nan_euclidean(row, other)
                        }
                    })
                    .collect();

                row.iter()
                    .enumerate()
                    .map(|(j, value)| match value {
                        Some(v) => *v,
                        None => self.estimate(rows, &distances, j).unwrap_or(means[j]),
                    })
                    .collect()
            })
            .collect();

        Ok(imputed)
    }

    /// Estimate column `j` from the nearest donors that observed it
    fn estimate(&self, rows: &[Vec<Option<f64>>], distances: &[Option<f64>], j: usize) -> Option<f64> {
        let mut donors: Vec<(f64, f64)> = rows
            .iter()
            .zip(distances.iter())
            .filter_map(|(donor, d)| match (donor[j], d) {
                (Some(v), Some(d)) => Some((*d, v)),
                _ => None,
            })
            .collect();

        if donors.is_empty() {
            return None;
        }

        donors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        donors.truncate(self.n_neighbors);

        match self.weighting {
            Weighting::Uniform => {
                Some(donors.iter().map(|(_, v)| v).sum::<f64>() / donors.len() as f64)
            }
            Weighting::Distance => {
                let exact: Vec<f64> = donors
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|(_, v)| *v)
                    .collect();
                if !exact.is_empty() {
                    return Some(exact.iter().sum::<f64>() / exact.len() as f64);
                }
                let total_weight: f64 = donors.iter().map(|(d, _)| 1.0 / d).sum();
                Some(donors.iter().map(|(d, v)| v / d).sum::<f64>() / total_weight)
            }
        }
    }

    /// Impute the listed numeric columns of a table jointly.
    ///
    /// Returns the new table (imputed columns become Float64) and the number
    /// of filled cells per column.
    pub fn fit_transform(
        &self,
        df: &DataFrame,
        columns: &[String],
    ) -> Result<(DataFrame, Vec<(String, usize)>)> {
        if columns.is_empty() {
            return Ok((df.clone(), Vec::new()));
        }
        if df.height() == 0 {
            return Err(PipelineError::EmptyTable {
                stage: "nearest-neighbour imputation",
            }
            .into());
        }

        let mut values: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
        for name in columns {
            let col: Vec<Option<f64>> = column_f64(df, name)?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect();
            if col.iter().all(Option::is_none) {
                return Err(PipelineError::AllMissing {
                    column: name.clone(),
                }
                .into());
            }
            values.push(col);
        }

        let filled_counts: Vec<(String, usize)> = columns
            .iter()
            .zip(values.iter())
            .map(|(name, col)| (name.clone(), col.iter().filter(|v| v.is_none()).count()))
            .collect();

        // Column-major to row-major
        let rows: Vec<Vec<Option<f64>>> = (0..df.height())
            .map(|i| values.iter().map(|col| col[i]).collect())
            .collect();

        let imputed = self.impute_rows(&rows)?;

        let mut out = df.clone();
        for (j, name) in columns.iter().enumerate() {
            let col: Vec<f64> = imputed.iter().map(|row| row[j]).collect();
            out.with_column(Column::new(name.as_str().into(), col))?;
        }

        Ok((out, filled_counts))
    }
}

/// How a categorical column's nulls are filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoricalFill {
    /// Most frequent value (ties: lexicographically smallest)
    Mode,
    /// A fixed placeholder
    Constant(String),
}

/// Most frequent non-null value of a string column
pub fn mode_of(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    // BTreeMap iterates in key order; the fold keeps the first maximum
    counts
        .into_iter()
        .fold(None::<(&str, usize)>, |best, (key, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((key, count)),
        })
        .map(|(key, _)| key.to_string())
}

/// Fill nulls in a categorical column. Returns the new table, the number of
/// filled cells and the fill value.
pub fn fill_categorical(
    df: &DataFrame,
    column: &str,
    fill: &CategoricalFill,
) -> Result<(DataFrame, usize, String)> {
    let dtype = df.column(column)?.dtype().clone();
    if is_numeric(&dtype) && df.column(column)?.null_count() < df.height() {
        return Err(PipelineError::InvalidParameter {
            name: "column",
            reason: format!("'{}' is numeric ({}), not categorical", column, dtype),
        }
        .into());
    }

    let values = column_strings(df, column)?;
    let null_count = values.iter().filter(|v| v.is_none()).count();

    let fill_value = match fill {
        CategoricalFill::Constant(value) => value.clone(),
        CategoricalFill::Mode => mode_of(&values).ok_or_else(|| PipelineError::AllMissing {
            column: column.to_string(),
        })?,
    };

    let filled: Vec<String> = values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill_value.clone()))
        .collect();

    let mut out = df.clone();
    out.with_column(Column::new(column.into(), filled))?;
    Ok((out, null_count, fill_value))
}

/// Outcome of the final catch-all fill
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemainingFill {
    /// (column, filled cells, fill value as text)
    pub filled: Vec<(String, usize, String)>,
    /// Columns with no observed value, removed from the table
    pub dropped_all_missing: Vec<String>,
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Fill every remaining null: numeric columns with their median, categorical
/// columns with their mode. Columns that are entirely null are dropped and
/// reported. Columns in `exclude` are left untouched.
pub fn fill_remaining(df: &DataFrame, exclude: &[String]) -> Result<(DataFrame, RemainingFill)> {
    let mut out = df.clone();
    let mut report = RemainingFill::default();

    if df.height() == 0 {
        return Ok((out, report));
    }

    for col in df.get_columns() {
        let name = col.name().to_string();
        let nulls = col.null_count();
        if nulls == 0 || exclude.contains(&name) {
            continue;
        }
        if nulls == df.height() {
            report.dropped_all_missing.push(name);
            continue;
        }

        if is_numeric(col.dtype()) {
            let values = column_f64(df, &name)?;
            let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
            let med = median(&mut observed).unwrap_or_default();
            let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(med)).collect();
            out.with_column(Column::new(name.as_str().into(), filled))?;
            report.filled.push((name, nulls, format!("{}", med)));
        } else if is_categorical(col.dtype()) {
            let (next, count, value) = fill_categorical(&out, &name, &CategoricalFill::Mode)?;
            out = next;
            report.filled.push((name, count, value));
        }
    }

    if !report.dropped_all_missing.is_empty() {
        out = out.drop_many(&report.dropped_all_missing);
    }

    Ok((out, report))
}

/// Median and mode of each column of the cleaned training rows.
///
/// Stored with the model so nulls in a scored table are filled from the
/// training data, never from the table being scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingFills {
    /// (column, median)
    pub numeric: Vec<(String, f64)>,
    /// (column, mode)
    pub categorical: Vec<(String, String)>,
}

impl TrainingFills {
    /// Learn fill values from every column except `exclude`
    pub fn fit(df: &DataFrame, exclude: &[String]) -> Result<Self> {
        let mut fills = Self::default();
        for col in df.get_columns() {
            let name = col.name().to_string();
            if exclude.contains(&name) {
                continue;
            }
            if is_numeric(col.dtype()) {
                let mut observed: Vec<f64> = column_f64(df, &name)?
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_nan())
                    .collect();
                if let Some(med) = median(&mut observed) {
                    fills.numeric.push((name, med));
                }
            } else if is_categorical(col.dtype()) {
                if let Some(mode) = mode_of(&column_strings(df, &name)?) {
                    fills.categorical.push((name, mode));
                }
            }
        }
        Ok(fills)
    }

    /// Fill nulls in every column a value was learned for. A column that is
    /// entirely null is filled too, whatever dtype the reader inferred for
    /// it. Returns the table and the cells filled per column.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, Vec<(String, usize)>)> {
        let present = column_names(df);
        let mut out = df.clone();
        let mut filled = Vec::new();

        for (name, value) in &self.numeric {
            if !present.contains(name) {
                continue;
            }
            let column = df.column(name)?;
            let nulls = column.null_count();
            let all_null = nulls == df.height();
            if nulls == 0 || !(all_null || is_numeric(column.dtype())) {
                continue;
            }
            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast.f64()?.iter().map(|v| v.unwrap_or(*value)).collect();
            out.with_column(Column::new(name.as_str().into(), values))?;
            filled.push((name.clone(), nulls));
        }

        for (name, value) in &self.categorical {
            if !present.contains(name) {
                continue;
            }
            let nulls = df.column(name)?.null_count();
            if nulls == 0 {
                continue;
            }
            let values: Vec<String> = column_strings(df, name)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| value.clone()))
                .collect();
            out.with_column(Column::new(name.as_str().into(), values))?;
            filled.push((name.clone(), nulls));
        }

        Ok((out, filled))
    }
}

/// What the cleaning stage changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    pub knn_filled: Vec<(String, usize)>,
    /// (column, filled cells, fill value)
    pub categorical_filled: Vec<(String, usize, String)>,
    pub remaining: RemainingFill,
}

impl CleaningReport {
    pub fn total_filled(&self) -> usize {
        self.knn_filled.iter().map(|(_, n)| n).sum::<usize>()
            + self.categorical_filled.iter().map(|(_, n, _)| n).sum::<usize>()
            + self.remaining.filled.iter().map(|(_, n, _)| n).sum::<usize>()
    }
}

/// Run the full cleaning stage: schema check, joint numeric imputation,
/// categorical fills, then the catch-all median/mode fill.
pub fn clean_dataset(
    df: &DataFrame,
    schema: &MovieSchema,
    imputer: &KnnImputer,
) -> Result<(DataFrame, CleaningReport)> {
    schema.validate(df)?;
    if df.height() == 0 {
        return Err(PipelineError::EmptyTable { stage: "cleaning" }.into());
    }

    let mut report = CleaningReport::default();

    let (mut out, knn_filled) = imputer.fit_transform(df, &schema.impute_numeric)?;
    report.knn_filled = knn_filled;

    for column in &schema.mode_fill {
        let (next, count, value) = fill_categorical(&out, column, &CategoricalFill::Mode)?;
        out = next;
        report.categorical_filled.push((column.clone(), count, value));
    }

    let unknown = CategoricalFill::Constant(UNKNOWN.to_string());
    for column in &schema.unknown_fill {
        let (next, count, value) = fill_categorical(&out, column, &unknown)?;
        out = next;
        report.categorical_filled.push((column.clone(), count, value));
    }

    let (out, remaining) = fill_remaining(&out, &[schema.target.clone()])?;
    report.remaining = remaining;

    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_fills_learn_median_and_mode() {
        let train = df! {
            "budget" => [Some(1.0f64), Some(3.0), None, Some(10.0)],
            "color" => [Some("Color"), None, Some("Color"), Some("Black and White")],
            "gross" => [5.0f64, 6.0, 7.0, 8.0],
        }
        .unwrap();
        let fills = TrainingFills::fit(&train, &["gross".to_string()]).unwrap();
        assert_eq!(fills.numeric, vec![("budget".to_string(), 3.0)]);
        assert_eq!(fills.categorical, vec![("color".to_string(), "Color".to_string())]);
    }

    #[test]
    fn test_training_fills_ignore_scored_table_statistics() {
        let fills = TrainingFills {
            numeric: vec![("budget".to_string(), 3.0)],
            categorical: vec![("color".to_string(), "Color".to_string())],
        };
        let unseen = df! {
            "budget" => [Some(500.0f64), None, Some(700.0)],
            "color" => [None, Some("Black and White"), Some("Black and White")],
        }
        .unwrap();
        let (out, filled) = fills.apply(&unseen).unwrap();
        assert_eq!(
            column_f64(&out, "budget").unwrap(),
            vec![Some(500.0), Some(3.0), Some(700.0)]
        );
        assert_eq!(column_strings(&out, "color").unwrap()[0].as_deref(), Some("Color"));
        assert_eq!(filled, vec![("budget".to_string(), 1), ("color".to_string(), 1)]);
    }

    #[test]
    fn test_training_fills_keep_all_null_columns() {
        let fills = TrainingFills {
            numeric: vec![("budget".to_string(), 3.0)],
            categorical: Vec::new(),
        };
        let unseen = DataFrame::new(vec![
            Column::new("budget".into(), [None::<&str>, None]),
            Column::new("duration".into(), [100.0f64, 120.0]),
        ])
        .unwrap();
        let (out, _) = fills.apply(&unseen).unwrap();
        assert_eq!(out.width(), 2);
        assert_eq!(column_f64(&out, "budget").unwrap(), vec![Some(3.0), Some(3.0)]);
    }

    #[test]
    fn test_nan_euclidean_scales_by_present_coordinates() {
        let a = [Some(0.0), None, Some(0.0)];
        let b = [Some(3.0), Some(1.0), Some(4.0)];
        // sqrt(3/2 * (9 + 16))
        let d = nan_euclidean(&a, &b).unwrap();
        assert!((d - (1.5f64 * 25.0).sqrt()).abs() < 1e-12);
        assert!(nan_euclidean(&[None, Some(1.0)], &[Some(1.0), None]).is_none());
    }

    #[test]
    fn test_uniform_uses_k_nearest() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(2.0), Some(20.0)],
            vec![Some(100.0), Some(1000.0)],
            vec![Some(1.5), None],
        ];
        let imputer = KnnImputer::new(2, Weighting::Uniform);
        let out = imputer.impute_rows(&rows).unwrap();
        assert!((out[3][1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weighting_prefers_exact_match() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(5.0), Some(50.0)],
            vec![Some(1.0), None],
        ];
        let imputer = KnnImputer::new(2, Weighting::Distance);
        let out = imputer.impute_rows(&rows).unwrap();
        assert_eq!(out[2][1], 10.0);
    }

    #[test]
    fn test_no_shared_coordinate_falls_back_to_mean() {
        let rows = vec![
            vec![None, Some(2.0)],
            vec![None, Some(4.0)],
            vec![Some(1.0), None],
        ];
        let out = KnnImputer::default().impute_rows(&rows).unwrap();
        assert!((out[2][1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_column_errors() {
        let df = df! {
            "budget" => [None::<f64>, None, None],
            "gross" => [1.0f64, 2.0, 3.0],
        }
        .unwrap();
        let err = KnnImputer::default()
            .fit_transform(&df, &["budget".to_string(), "gross".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn test_mode_ties_break_lexicographically() {
        let values = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            Some("b".to_string()),
            Some("a".to_string()),
            None,
        ];
        assert_eq!(mode_of(&values), Some("a".to_string()));
        assert_eq!(mode_of(&[None, None]), None);
    }

    #[test]
    fn test_fill_categorical_constant() {
        let df = df! { "director_name" => [Some("Nolan"), None, Some("Bigelow")] }.unwrap();
        let (out, count, value) = fill_categorical(
            &df,
            "director_name",
            &CategoricalFill::Constant(UNKNOWN.to_string()),
        )
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(value, "Unknown");
        assert_eq!(out.column("director_name").unwrap().null_count(), 0);
    }

    #[test]
    fn test_fill_remaining_median_and_drop() {
        let df = df! {
            "likes" => [Some(1.0f64), None, Some(3.0), Some(10.0)],
            "empty" => [None::<f64>, None, None, None],
            "genres" => [Some("Drama"), Some("Drama"), None, Some("Action")],
        }
        .unwrap();
        let (out, report) = fill_remaining(&df, &[]).unwrap();
        assert_eq!(report.dropped_all_missing, vec!["empty"]);
        let likes = column_f64(&out, "likes").unwrap();
        assert_eq!(likes[1], Some(3.0));
        let genres = column_strings(&out, "genres").unwrap();
        assert_eq!(genres[2].as_deref(), Some("Drama"));
    }
}
