//! Column roles of the movie table and schema checks at stage boundaries

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Which columns of the movie table play which role in the pipeline.
///
/// The defaults describe the IMDb movie metadata export (`movie_metadata.csv`);
/// tests and other datasets supply their own lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSchema {
    /// Regression target (box-office gross)
    pub target: String,
    /// Numeric columns imputed jointly by nearest neighbours
    pub impute_numeric: Vec<String>,
    /// Categorical columns whose nulls become the column mode
    pub mode_fill: Vec<String>,
    /// Categorical columns whose nulls become the literal "Unknown"
    pub unknown_fill: Vec<String>,
    /// Candidate columns for the univariate and importance rankings
    pub selection_features: Vec<String>,
    /// Column label-encoded for inspection
    pub label_inspect: Option<String>,
    /// Categorical column used for rating breakdowns in exploration
    pub rating_column: Option<String>,
    /// Categorical column counted in exploration
    pub count_column: Option<String>,
    /// Columns whose target sums are reported in exploration
    pub trend_columns: Vec<String>,
    /// Column holding the production budget
    pub budget_column: Option<String>,
    /// Delimited multi-valued columns expanded into one indicator per token
    pub multi_label: Vec<String>,
    pub multi_label_separator: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for MovieSchema {
    fn default() -> Self {
        Self {
            target: "gross".to_string(),
            impute_numeric: strings(&[
                "budget",
                "gross",
                "duration",
                "num_critic_for_reviews",
                "title_year",
                "director_facebook_likes",
                "actor_3_facebook_likes",
                "aspect_ratio",
            ]),
            mode_fill: strings(&["color", "language"]),
            unknown_fill: strings(&[
                "director_name",
                "actor_2_name",
                "actor_3_name",
                "actor_1_name",
                "plot_keywords",
                "content_rating",
            ]),
            selection_features: strings(&[
                "director_name",
                "actor_1_name",
                "budget",
                "num_critic_for_reviews",
                "movie_facebook_likes",
                "genres",
                "imdb_score",
                "cast_total_facebook_likes",
                "content_rating",
            ]),
            label_inspect: Some("content_rating".to_string()),
            rating_column: Some("content_rating".to_string()),
            count_column: Some("color".to_string()),
            trend_columns: strings(&["title_year", "language", "country"]),
            budget_column: Some("budget".to_string()),
            multi_label: strings(&["genres"]),
            multi_label_separator: "|".to_string(),
        }
    }
}

impl MovieSchema {
    /// A schema with only a target and numeric imputation columns
    pub fn numeric_only(target: &str, impute_numeric: &[&str]) -> Self {
        Self {
            target: target.to_string(),
            impute_numeric: strings(impute_numeric),
            mode_fill: Vec::new(),
            unknown_fill: Vec::new(),
            selection_features: impute_numeric
                .iter()
                .filter(|c| **c != target)
                .map(|c| c.to_string())
                .collect(),
            label_inspect: None,
            rating_column: None,
            count_column: None,
            trend_columns: Vec::new(),
            budget_column: None,
            multi_label: Vec::new(),
            multi_label_separator: "|".to_string(),
        }
    }

    /// Columns the cleaning stage cannot run without
    pub fn required_columns(&self) -> Vec<String> {
        let mut required = vec![self.target.clone()];
        for col in self
            .impute_numeric
            .iter()
            .chain(&self.mode_fill)
            .chain(&self.unknown_fill)
        {
            if !required.contains(col) {
                required.push(col.clone());
            }
        }
        required
    }

    /// Fail with the full list of absent columns
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        let required = self.required_columns();
        let refs: Vec<&str> = required.iter().map(String::as_str).collect();
        require_columns(df, &refs)
    }
}

/// Check that every listed column exists in the table
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let available = column_names(df);
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !available.iter().any(|a| a == *c))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns { missing, available }.into())
    }
}

/// Owned column names in table order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Whether a dtype is treated as categorical
pub fn is_categorical(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

/// Whether a dtype can be cast into a numeric feature
pub fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric() || matches!(dtype, DataType::Boolean)
}

/// Numeric columns in table order
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Categorical (string) columns in table order
pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_categorical(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Extract a column as optional f64 values
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?;
    if !is_numeric(column.dtype()) {
        return Err(PipelineError::NonNumericFeature {
            column: name.to_string(),
            dtype: column.dtype().to_string(),
        }
        .into());
    }
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.iter().collect())
}

/// Extract a column as optional strings (any dtype)
pub fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let cast = df.column(name)?.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}
