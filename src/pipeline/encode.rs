//! Categorical encoders
//!
//! Every encoder is fit once and then applied unchanged to every later
//! slice (test rows, unseen data), so the indicator layout can never drift
//! between training and scoring.

use std::collections::BTreeSet;

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::impute::UNKNOWN;
use super::schema::{column_f64, column_strings, require_columns};

/// Integer codes for the sorted distinct values of one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub column: String,
    pub classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on a table column; nulls are treated as "Unknown"
    pub fn fit(df: &DataFrame, column: &str) -> Result<Self> {
        let values = label_values(df, column)?;
        let classes: BTreeSet<String> = values.into_iter().collect();
        Ok(Self {
            column: column.to_string(),
            classes: classes.into_iter().collect(),
        })
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Vec<u32>> {
        label_values(df, &self.column)?
            .iter()
            .map(|v| self.code_of(v))
            .collect()
    }

    fn code_of(&self, value: &str) -> Result<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|idx| idx as u32)
            .map_err(|_| {
                PipelineError::UnseenCategory {
                    column: self.column.clone(),
                    value: value.to_string(),
                }
                .into()
            })
    }

    pub fn inverse_transform(&self, codes: &[u32]) -> Result<Vec<String>> {
        codes
            .iter()
            .map(|&code| {
                self.classes.get(code as usize).cloned().ok_or_else(|| {
                    PipelineError::UnseenCategory {
                        column: self.column.clone(),
                        value: code.to_string(),
                    }
                    .into()
                })
            })
            .collect()
    }
}

fn label_values(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    Ok(column_strings(df, column)?
        .into_iter()
        .map(|v| v.unwrap_or_else(|| UNKNOWN.to_string()))
        .collect())
}

/// Categories learned for one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub column: String,
    /// Categories that get an indicator column, sorted
    pub categories: Vec<String>,
    /// Category represented by an all-zero indicator group
    pub dropped: Option<String>,
}

impl EncodedColumn {
    pub fn indicator_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| indicator_name(&self.column, c))
            .collect()
    }
}

/// Indicator column name for a category
pub fn indicator_name(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

/// One-hot encoder with optional first-category drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub drop_first: bool,
    pub columns: Vec<EncodedColumn>,
}

impl OneHotEncoder {
    /// Learn the sorted categories of each listed column
    pub fn fit(df: &DataFrame, columns: &[String], drop_first: bool) -> Result<Self> {
        let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        require_columns(df, &refs)?;

        let mut encoded = Vec::with_capacity(columns.len());
        for column in columns {
            let distinct: BTreeSet<String> =
                column_strings(df, column)?.into_iter().flatten().collect();
            let mut categories: Vec<String> = distinct.into_iter().collect();
            let dropped = if drop_first && !categories.is_empty() {
                Some(categories.remove(0))
            } else {
                None
            };
            encoded.push(EncodedColumn {
                column: column.clone(),
                categories,
                dropped,
            });
        }

        Ok(Self {
            drop_first,
            columns: encoded,
        })
    }

    /// Names of the source columns this encoder replaces
    pub fn source_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }

    /// All indicator columns, in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(EncodedColumn::indicator_names)
            .collect()
    }

    /// Replace every encoded column with its indicators. All encoded columns
    /// must be present. Unseen values and nulls encode as all zeros.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let sources = self.source_columns();
        let refs: Vec<&str> = sources.iter().map(String::as_str).collect();
        require_columns(df, &refs)?;
        self.encode_present(df)
    }

    /// Like `transform`, but skips encoded columns absent from the table.
    /// Used when scoring tables that only partly match the training schema.
    pub fn transform_available(&self, df: &DataFrame) -> Result<DataFrame> {
        self.encode_present(df)
    }

    fn encode_present(&self, df: &DataFrame) -> Result<DataFrame> {
        let names = super::schema::column_names(df);
        let present: Vec<&EncodedColumn> = self
            .columns
            .iter()
            .filter(|c| names.contains(&c.column))
            .collect();

        let to_drop: Vec<String> = present.iter().map(|c| c.column.clone()).collect();
        let mut out = df.drop_many(&to_drop);

        for encoded in present {
            let values = column_strings(df, &encoded.column)?;
            for category in &encoded.categories {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| match v {
                        Some(v) if v == category => 1.0,
                        _ => 0.0,
                    })
                    .collect();
                out.with_column(Column::new(
                    indicator_name(&encoded.column, category).into(),
                    indicator,
                ))?;
            }
        }

        Ok(out)
    }

    /// Recover the categorical columns from their indicators. An all-zero
    /// group decodes to the dropped category (null when nothing was dropped).
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for encoded in &self.columns {
            let indicators: Vec<Vec<Option<f64>>> = encoded
                .indicator_names()
                .iter()
                .map(|name| column_f64(df, name))
                .collect::<Result<_>>()?;

            let decoded: Vec<Option<String>> = (0..df.height())
                .map(|row| {
                    encoded
                        .categories
                        .iter()
                        .zip(indicators.iter())
                        .find(|(_, ind)| ind[row] == Some(1.0))
                        .map(|(category, _)| category.clone())
                        .or_else(|| encoded.dropped.clone())
                })
                .collect();

            columns.push(Column::new(encoded.column.as_str().into(), decoded));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Tokens learned for one delimited column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenColumn {
    pub column: String,
    /// Distinct tokens, sorted
    pub tokens: Vec<String>,
}

/// Multi-hot encoder for delimited multi-valued columns such as
/// `Action|Adventure|Sci-Fi`: one indicator per distinct token, set when the
/// token appears anywhere in the cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLabelEncoder {
    pub separator: String,
    pub columns: Vec<TokenColumn>,
}

impl Default for MultiLabelEncoder {
    fn default() -> Self {
        Self {
            separator: "|".to_string(),
            columns: Vec::new(),
        }
    }
}

impl MultiLabelEncoder {
    pub fn fit(df: &DataFrame, columns: &[String], separator: &str) -> Result<Self> {
        let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        require_columns(df, &refs)?;

        let mut learned = Vec::with_capacity(columns.len());
        for column in columns {
            let tokens: BTreeSet<String> = column_strings(df, column)?
                .iter()
                .flatten()
                .flat_map(|cell| split_tokens(cell, separator))
                .collect();
            learned.push(TokenColumn {
                column: column.clone(),
                tokens: tokens.into_iter().collect(),
            });
        }

        Ok(Self {
            separator: separator.to_string(),
            columns: learned,
        })
    }

    pub fn source_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| c.tokens.iter().map(|t| indicator_name(&c.column, t)))
            .collect()
    }

    /// Replace each present source column with its token indicators. Unseen
    /// tokens are ignored and nulls encode as all zeros.
    pub fn transform_available(&self, df: &DataFrame) -> Result<DataFrame> {
        let names = super::schema::column_names(df);
        let present: Vec<&TokenColumn> = self
            .columns
            .iter()
            .filter(|c| names.contains(&c.column))
            .collect();

        let to_drop: Vec<String> = present.iter().map(|c| c.column.clone()).collect();
        let mut out = df.drop_many(&to_drop);

        for learned in present {
            let cells: Vec<BTreeSet<String>> = column_strings(df, &learned.column)?
                .iter()
                .map(|cell| match cell {
                    Some(c) => split_tokens(c, &self.separator).collect(),
                    None => BTreeSet::new(),
                })
                .collect();
            for token in &learned.tokens {
                let indicator: Vec<f64> = cells
                    .iter()
                    .map(|set| if set.contains(token) { 1.0 } else { 0.0 })
                    .collect();
                out.with_column(Column::new(
                    indicator_name(&learned.column, token).into(),
                    indicator,
                ))?;
            }
        }

        Ok(out)
    }
}

fn split_tokens<'a>(cell: &'a str, separator: &'a str) -> impl Iterator<Item = String> + 'a {
    cell.split(separator)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Distinct non-null value count of each listed column
pub fn cardinalities(df: &DataFrame, columns: &[String]) -> Result<Vec<(String, usize)>> {
    columns
        .iter()
        .map(|column| {
            let distinct: BTreeSet<String> =
                column_strings(df, column)?.into_iter().flatten().collect();
            Ok((column.clone(), distinct.len()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> DataFrame {
        df! {
            "content_rating" => [Some("R"), Some("PG"), Some("PG-13"), Some("R"), None],
            "budget" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        }
        .unwrap()
    }

    #[test]
    fn test_label_encoder_sorted_codes() {
        let df = ratings();
        let le = LabelEncoder::fit(&df, "content_rating").unwrap();
        assert_eq!(le.classes, vec!["PG", "PG-13", "R", "Unknown"]);
        let codes = le.transform(&df).unwrap();
        assert_eq!(codes, vec![2, 0, 1, 2, 3]);
        let back = le.inverse_transform(&codes).unwrap();
        assert_eq!(back[1], "PG");
    }

    #[test]
    fn test_label_encoder_unseen_errors() {
        let le = LabelEncoder::fit(&ratings(), "content_rating").unwrap();
        let other = df! { "content_rating" => ["NC-17"] }.unwrap();
        assert!(le.transform(&other).is_err());
    }

    #[test]
    fn test_one_hot_drop_first_layout() {
        let df = ratings();
        let enc = OneHotEncoder::fit(&df, &["content_rating".to_string()], true).unwrap();
        assert_eq!(enc.columns[0].dropped.as_deref(), Some("PG"));
        assert_eq!(
            enc.feature_names(),
            vec!["content_rating_PG-13", "content_rating_R"]
        );

        let out = enc.transform(&df).unwrap();
        let names = crate::pipeline::schema::column_names(&out);
        assert_eq!(names, vec!["budget", "content_rating_PG-13", "content_rating_R"]);
    }

    #[test]
    fn test_unseen_value_encodes_as_zeros() {
        let enc =
            OneHotEncoder::fit(&ratings(), &["content_rating".to_string()], false).unwrap();
        let other = df! { "content_rating" => ["NC-17"] }.unwrap();
        let out = enc.transform(&other).unwrap();
        for name in enc.feature_names() {
            assert_eq!(column_f64(&out, &name).unwrap(), vec![Some(0.0)]);
        }
    }

    #[test]
    fn test_transform_available_skips_absent_columns() {
        let enc =
            OneHotEncoder::fit(&ratings(), &["content_rating".to_string()], true).unwrap();
        let other = df! { "age" => [30.0f64] }.unwrap();
        assert!(enc.transform(&other).is_err());
        let out = enc.transform_available(&other).unwrap();
        assert_eq!(out.width(), 1);
    }

    #[test]
    fn test_multi_label_one_indicator_per_token() {
        let df = df! {
            "genres" => [Some("Action|Sci-Fi"), Some("Drama"), None, Some("Action|Drama")],
        }
        .unwrap();
        let enc = MultiLabelEncoder::fit(&df, &["genres".to_string()], "|").unwrap();
        assert_eq!(
            enc.feature_names(),
            vec!["genres_Action", "genres_Drama", "genres_Sci-Fi"]
        );

        let out = enc.transform_available(&df).unwrap();
        assert!(out.column("genres").is_err());
        assert_eq!(
            column_f64(&out, "genres_Action").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]
        );
        assert_eq!(
            column_f64(&out, "genres_Drama").unwrap(),
            vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]
        );
    }

    #[test]
    fn test_multi_label_ignores_unseen_tokens() {
        let train = df! { "genres" => ["Comedy|Romance"] }.unwrap();
        let enc = MultiLabelEncoder::fit(&train, &["genres".to_string()], "|").unwrap();
        let other = df! { "genres" => ["Western|Comedy"] }.unwrap();
        let out = enc.transform_available(&other).unwrap();
        assert_eq!(out.width(), 2);
        assert_eq!(column_f64(&out, "genres_Comedy").unwrap(), vec![Some(1.0)]);
        assert_eq!(column_f64(&out, "genres_Romance").unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn test_cardinalities_ignore_nulls() {
        let cards = cardinalities(&ratings(), &["content_rating".to_string()]).unwrap();
        assert_eq!(cards, vec![("content_rating".to_string(), 3)]);
    }
}
