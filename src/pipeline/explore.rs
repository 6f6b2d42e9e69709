//! Exploratory summaries of the movie table
//!
//! Each function reproduces one of the descriptive views (gross by rating,
//! movies by colour, gross over the years) as a table. Nothing here feeds the
//! modelling stages.

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;

use super::outliers::quantile_sorted;
use super::schema::{column_f64, column_strings, numeric_columns, require_columns};

/// Summary statistics for one numeric column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Count, mean, sample standard deviation and quartiles of every numeric
/// column. Columns with no observed value are skipped.
pub fn describe(df: &DataFrame) -> Result<Vec<ColumnSummary>> {
    let mut summaries = Vec::new();
    for column in numeric_columns(df) {
        let mut values: Vec<f64> = column_f64(df, &column)?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        summaries.push(ColumnSummary {
            column,
            count: values.len(),
            mean,
            std,
            min: values[0],
            q1: quantile_sorted(&values, 0.25),
            median: quantile_sorted(&values, 0.5),
            q3: quantile_sorted(&values, 0.75),
            max: values[values.len() - 1],
        });
    }
    Ok(summaries)
}

/// Null count per column, largest first (ties keep table order)
pub fn missing_counts(df: &DataFrame) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = df
        .get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// How grouped values are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Aggregation {
    Sum,
    Mean,
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Mean => write!(f, "mean"),
        }
    }
}

/// One group-by view: key → aggregated value, ordered by key
#[derive(Debug, Clone, Serialize)]
pub struct GroupedView {
    pub by: String,
    pub value: String,
    pub aggregation: Aggregation,
    pub rows: Vec<(String, f64)>,
}

/// Aggregate `value` grouped by `by`. Rows with a null key are ignored.
pub fn group_aggregate(
    df: &DataFrame,
    by: &str,
    value: &str,
    aggregation: Aggregation,
) -> Result<GroupedView> {
    require_columns(df, &[by, value])?;

    let value_expr = col(value).cast(DataType::Float64);
    let agg = match aggregation {
        Aggregation::Sum => value_expr.sum(),
        Aggregation::Mean => value_expr.mean(),
    };

    let grouped = df
        .clone()
        .lazy()
        .filter(col(by).is_not_null())
        .group_by([col(by)])
        .agg([agg.alias(value)])
        .sort([by], SortMultipleOptions::default())
        .collect()?;

    let keys = column_strings(&grouped, by)?;
    let values = column_f64(&grouped, value)?;

    let rows = keys
        .into_iter()
        .zip(values)
        .map(|(k, v)| (k.unwrap_or_default(), v.unwrap_or(f64::NAN)))
        .collect();

    Ok(GroupedView {
        by: by.to_string(),
        value: value.to_string(),
        aggregation,
        rows,
    })
}

/// Frequency of each value of a column, most frequent first (ties by value)
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    require_columns(df, &[column])?;

    let counts = df
        .clone()
        .lazy()
        .filter(col(column).is_not_null())
        .group_by([col(column)])
        .agg([len().alias("count")])
        .collect()?;

    let keys = column_strings(&counts, column)?;
    let values = column_f64(&counts, "count")?;

    let mut rows: Vec<(String, usize)> = keys
        .into_iter()
        .zip(values)
        .map(|(k, v)| (k.unwrap_or_default(), v.unwrap_or_default() as usize))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(rows)
}

/// Every exploratory view produced for the movie table
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExplorationReport {
    pub summaries: Vec<ColumnSummary>,
    pub grouped: Vec<GroupedView>,
    pub counts: Vec<(String, Vec<(String, usize)>)>,
}

/// Build the standard views, skipping any whose columns are absent
pub fn explore_movies(
    df: &DataFrame,
    schema: &super::schema::MovieSchema,
) -> Result<ExplorationReport> {
    let names = super::schema::column_names(df);
    let has = |c: &str| names.iter().any(|n| n == c);
    let target = schema.target.as_str();

    let mut report = ExplorationReport {
        summaries: describe(df)?,
        ..Default::default()
    };

    if let Some(rating) = schema.rating_column.as_deref().filter(|c| has(c)) {
        report
            .grouped
            .push(group_aggregate(df, rating, target, Aggregation::Mean)?);
        if let Some(budget) = schema.budget_column.as_deref().filter(|c| has(c)) {
            report
                .grouped
                .push(group_aggregate(df, rating, budget, Aggregation::Mean)?);
        }
    }

    if let Some(count_col) = schema.count_column.as_deref().filter(|c| has(c)) {
        report
            .counts
            .push((count_col.to_string(), value_counts(df, count_col)?));
    }

    for trend in schema.trend_columns.iter().filter(|c| has(c)) {
        report
            .grouped
            .push(group_aggregate(df, trend, target, Aggregation::Sum)?);
    }

    Ok(report)
}
