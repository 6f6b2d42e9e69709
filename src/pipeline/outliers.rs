//! Interquartile-range outlier detection
//!
//! Diagnostic only: nothing here filters or mutates the working table.

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;

use super::schema::column_f64;

/// Tukey fences for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Linearly interpolated quantile of sorted data
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Compute Q1, Q3 and the 1.5·IQR fences. `None` for an empty slice.
pub fn iqr_bounds(values: &[f64]) -> Option<IqrBounds> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    Some(IqrBounds {
        q1,
        q3,
        iqr,
        lower: q1 - 1.5 * iqr,
        upper: q3 + 1.5 * iqr,
    })
}

/// Rows whose value in `column` lies outside the IQR fences.
///
/// Nulls are never flagged. Returns an empty frame with the same schema
/// when the column has no observed value.
pub fn find_outliers_iqr(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let values = column_f64(df, column)?;
    let observed: Vec<f64> = values.iter().flatten().copied().collect();

    let mask: Vec<bool> = match iqr_bounds(&observed) {
        Some(bounds) => values
            .iter()
            .map(|v| v.map_or(false, |x| !bounds.contains(x)))
            .collect(),
        None => vec![false; df.height()],
    };

    let mask = BooleanChunked::from_slice("outlier".into(), &mask);
    Ok(df.filter(&mask)?)
}

/// Outlier count for one column
#[derive(Debug, Clone, Serialize)]
pub struct OutlierCount {
    pub column: String,
    pub bounds: Option<IqrBounds>,
    pub outliers: usize,
}

/// Count IQR outliers for each listed column
pub fn outlier_summary(df: &DataFrame, columns: &[String]) -> Result<Vec<OutlierCount>> {
    columns
        .iter()
        .map(|column| {
            let observed: Vec<f64> = column_f64(df, column)?.into_iter().flatten().collect();
            let bounds = iqr_bounds(&observed);
            let outliers = find_outliers_iqr(df, column)?.height();
            Ok(OutlierCount {
                column: column.clone(),
                bounds,
                outliers,
            })
        })
        .collect()
}
