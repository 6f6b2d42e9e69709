//! Column scalers fit on training rows and reused on every later matrix

use anyhow::Result;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::outliers::quantile_sorted;

/// A per-column affine transform `(x - offset) / scale`
pub trait FeatureScaler {
    fn offsets(&self) -> &[f64];
    fn scales(&self) -> &[f64];

    fn transform(&self, x: &Mat<f64>) -> Result<Mat<f64>> {
        let offsets = self.offsets();
        let scales = self.scales();
        if x.ncols() != offsets.len() {
            return Err(PipelineError::ShapeMismatch {
                context: "scaler input columns",
                expected: offsets.len(),
                actual: x.ncols(),
            }
            .into());
        }
        Ok(Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - offsets[j]) / scales[j]
        }))
    }
}

fn column_values(x: &Mat<f64>, j: usize) -> Vec<f64> {
    (0..x.nrows()).map(|i| x[(i, j)]).collect()
}

fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

fn require_rows(x: &Mat<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::EmptyTable { stage: "scaler fit" }.into());
    }
    Ok(())
}

/// Maps each column onto [0, 1] using the training minimum and maximum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub range: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(x: &Mat<f64>) -> Result<Self> {
        require_rows(x)?;
        let mut min = Vec::with_capacity(x.ncols());
        let mut range = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let values = column_values(x, j);
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            min.push(lo);
            range.push(non_zero(hi - lo));
        }
        Ok(Self { min, range })
    }
}

impl FeatureScaler for MinMaxScaler {
    fn offsets(&self) -> &[f64] {
        &self.min
    }

    fn scales(&self) -> &[f64] {
        &self.range
    }
}

/// Zero mean, unit (population) variance per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Mat<f64>) -> Result<Self> {
        require_rows(x)?;
        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut std = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let values = column_values(x, j);
            let m = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            mean.push(m);
            std.push(non_zero(var.sqrt()));
        }
        Ok(Self { mean, std })
    }
}

impl FeatureScaler for StandardScaler {
    fn offsets(&self) -> &[f64] {
        &self.mean
    }

    fn scales(&self) -> &[f64] {
        &self.std
    }
}

/// Median-centred, IQR-scaled columns; insensitive to extreme values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    pub median: Vec<f64>,
    pub iqr: Vec<f64>,
}

impl RobustScaler {
    pub fn fit(x: &Mat<f64>) -> Result<Self> {
        require_rows(x)?;
        let mut median = Vec::with_capacity(x.ncols());
        let mut iqr = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let mut values = column_values(x, j);
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            median.push(quantile_sorted(&values, 0.5));
            iqr.push(non_zero(
                quantile_sorted(&values, 0.75) - quantile_sorted(&values, 0.25),
            ));
        }
        Ok(Self { median, iqr })
    }
}

impl FeatureScaler for RobustScaler {
    fn offsets(&self) -> &[f64] {
        &self.median
    }

    fn scales(&self) -> &[f64] {
        &self.iqr
    }
}

/// Several per-column affine scalers folded into one, so a fitted chain can
/// be stored and replayed as a single transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineScaler {
    pub offset: Vec<f64>,
    pub scale: Vec<f64>,
}

impl AffineScaler {
    /// Compose `steps` in order. `(x - o1) / s1` followed by `(y - o2) / s2`
    /// is `(x - (o1 + s1·o2)) / (s1·s2)`.
    pub fn from_chain(steps: &[&dyn FeatureScaler]) -> Result<Self> {
        let Some(first) = steps.first() else {
            return Err(PipelineError::InvalidParameter {
                name: "steps",
                reason: "need at least one scaler to compose".to_string(),
            }
            .into());
        };
        let mut offset = first.offsets().to_vec();
        let mut scale = first.scales().to_vec();
        for step in &steps[1..] {
            if step.offsets().len() != offset.len() {
                return Err(PipelineError::ShapeMismatch {
                    context: "chained scaler columns",
                    expected: offset.len(),
                    actual: step.offsets().len(),
                }
                .into());
            }
            for j in 0..offset.len() {
                offset[j] += scale[j] * step.offsets()[j];
                scale[j] *= step.scales()[j];
            }
        }
        Ok(Self { offset, scale })
    }
}

impl FeatureScaler for AffineScaler {
    fn offsets(&self) -> &[f64] {
        &self.offset
    }

    fn scales(&self) -> &[f64] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Mat<f64> {
        Mat::from_fn(4, 2, |i, j| if j == 0 { i as f64 } else { 7.0 })
    }

    #[test]
    fn test_min_max_unit_range() {
        let x = sample();
        let scaled = MinMaxScaler::fit(&x).unwrap().transform(&x).unwrap();
        assert_eq!(scaled[(0, 0)], 0.0);
        assert_eq!(scaled[(3, 0)], 1.0);
        // Constant column keeps scale 1
        assert_eq!(scaled[(2, 1)], 0.0);
    }

    #[test]
    fn test_standard_zero_mean_unit_variance() {
        let x = sample();
        let scaled = StandardScaler::fit(&x).unwrap().transform(&x).unwrap();
        let col: Vec<f64> = (0..4).map(|i| scaled[(i, 0)]).collect();
        let mean = col.iter().sum::<f64>() / 4.0;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_robust_centres_on_median() {
        let x = Mat::from_fn(5, 1, |i, _| [1.0, 2.0, 3.0, 4.0, 1000.0][i]);
        let scaler = RobustScaler::fit(&x).unwrap();
        assert_eq!(scaler.median, vec![3.0]);
        assert_eq!(scaler.iqr, vec![2.0]);
    }

    #[test]
    fn test_chain_matches_sequential_transforms() {
        let x = Mat::from_fn(6, 2, |i, j| (i * i) as f64 + j as f64 * 3.0);
        let min_max = MinMaxScaler::fit(&x).unwrap();
        let step1 = min_max.transform(&x).unwrap();
        let standard = StandardScaler::fit(&step1).unwrap();
        let sequential = standard.transform(&step1).unwrap();

        let chained = AffineScaler::from_chain(&[&min_max, &standard]).unwrap();
        let direct = chained.transform(&x).unwrap();
        for i in 0..6 {
            for j in 0..2 {
                assert!((direct[(i, j)] - sequential[(i, j)]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_transform_checks_width() {
        let scaler = StandardScaler::fit(&sample()).unwrap();
        let wrong = Mat::<f64>::zeros(2, 3);
        assert!(scaler.transform(&wrong).is_err());
    }
}
