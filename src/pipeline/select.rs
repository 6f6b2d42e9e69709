//! Feature ranking: univariate F statistics and forest importances
//!
//! Both rankings are diagnostic. They are computed on the training rows
//! only and never feed the model feature set.

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::encode::LabelEncoder;
use super::features::{take_rows, take_values, target_vector, FeatureMatrix};
use super::models::{ForestParams, RandomForestRegressor, Regressor};
use super::schema::{column_names, is_categorical, MovieSchema};
use super::split::SplitIndices;

/// One ranked feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureScore {
    pub name: String,
    pub score: f64,
}

/// Univariate regression F statistic for each column of `x`.
///
/// `F = r² / (1 - r²) · (n - 2)` where `r` is the Pearson correlation of the
/// column with `y`. Constant columns score 0.
pub fn f_regression(x: &Mat<f64>, y: &[f64]) -> Vec<f64> {
    let n = x.nrows();
    if n < 3 || y.len() != n {
        return vec![0.0; x.ncols()];
    }
    let nf = n as f64;
    let y_mean = y.iter().sum::<f64>() / nf;
    let y_ss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();

    (0..x.ncols())
        .map(|j| {
            let x_mean = (0..n).map(|i| x[(i, j)]).sum::<f64>() / nf;
            let mut sxy = 0.0;
            let mut sxx = 0.0;
            for i in 0..n {
                let dx = x[(i, j)] - x_mean;
                sxy += dx * (y[i] - y_mean);
                sxx += dx * dx;
            }
            if sxx <= 0.0 || y_ss <= 0.0 {
                return 0.0;
            }
            let r2 = (sxy * sxy / (sxx * y_ss)).min(1.0);
            if r2 >= 1.0 {
                f64::INFINITY
            } else {
                r2 / (1.0 - r2) * (nf - 2.0)
            }
        })
        .collect()
}

/// Top `k` by score, descending, ties broken by name
fn top_k(scores: &[f64], names: &[String], k: usize) -> Vec<FeatureScore> {
    let mut ranked: Vec<FeatureScore> = names
        .iter()
        .zip(scores)
        .map(|(name, &score)| FeatureScore {
            name: name.clone(),
            score,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(k);
    ranked
}

/// The `k` highest F statistics
pub fn select_k_best(scores: &[f64], names: &[String], k: usize) -> Vec<FeatureScore> {
    top_k(scores, names, k)
}

/// The `k` largest importances
pub fn top_importances(importances: &[f64], names: &[String], k: usize) -> Vec<FeatureScore> {
    top_k(importances, names, k)
}

/// Both rankings over the candidate selection columns
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionReport {
    pub candidates: Vec<String>,
    /// Categorical candidates that were label-encoded
    pub label_encoded: Vec<String>,
    pub univariate: Vec<FeatureScore>,
    pub importance: Vec<FeatureScore>,
}

/// Candidate columns as a numeric table, label-encoding the categorical ones
fn selection_frame(df: &DataFrame, candidates: &[String]) -> Result<(DataFrame, Vec<String>)> {
    let mut columns = Vec::with_capacity(candidates.len());
    let mut encoded = Vec::new();
    for name in candidates {
        let column = df.column(name)?;
        if is_categorical(column.dtype()) {
            let encoder = LabelEncoder::fit(df, name)?;
            let codes: Vec<f64> = encoder.transform(df)?.into_iter().map(f64::from).collect();
            columns.push(Column::new(name.as_str().into(), codes));
            encoded.push(name.clone());
        } else {
            columns.push(column.cast(&DataType::Float64)?);
        }
    }
    Ok((DataFrame::new(columns)?, encoded))
}

/// Rank the schema's selection columns against the target on the training
/// rows. The target itself is never a candidate.
pub fn rank_features(
    df: &DataFrame,
    schema: &MovieSchema,
    split: &SplitIndices,
    k: usize,
    seed: u64,
) -> Result<SelectionReport> {
    let available = column_names(df);
    let candidates: Vec<String> = schema
        .selection_features
        .iter()
        .filter(|c| **c != schema.target && available.contains(c))
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Ok(SelectionReport::default());
    }

    let (frame, label_encoded) = selection_frame(df, &candidates)?;
    let matrix = FeatureMatrix::from_frame(&frame, &[])?;
    let y = target_vector(df, &schema.target)?;

    let x_train = take_rows(&matrix.data, &split.train);
    let y_train = take_values(&y, &split.train);

    let f_scores = f_regression(&x_train, &y_train);

    let mut forest = RandomForestRegressor::new(ForestParams {
        seed,
        ..Default::default()
    });
    forest.fit(&x_train, &y_train)?;
    let importances = forest
        .feature_importances()
        .unwrap_or_else(|| vec![0.0; matrix.ncols()]);

    Ok(SelectionReport {
        univariate: select_k_best(&f_scores, &matrix.names, k),
        importance: top_importances(&importances, &matrix.names, k),
        candidates,
        label_encoded,
    })
}
