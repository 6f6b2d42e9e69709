//! Boosted ensembles of shallow regression trees

use anyhow::Result;
use faer::Mat;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::pipeline::error::PipelineError;

fn stump_params(max_depth: usize) -> TreeParams {
    TreeParams {
        max_depth: Some(max_depth),
        ..Default::default()
    }
}

fn validate_rounds(n_estimators: usize, learning_rate: f64) -> Result<()> {
    if n_estimators == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "n_estimators",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(PipelineError::InvalidParameter {
            name: "learning_rate",
            reason: format!("must be positive, got {}", learning_rate),
        }
        .into());
    }
    Ok(())
}

/// Sum per-tree importances and renormalise
fn pooled_importances<'a>(
    trees: impl Iterator<Item = (&'a DecisionTreeRegressor, f64)>,
    n_features: usize,
) -> Vec<f64> {
    let mut total = vec![0.0; n_features];
    for (tree, weight) in trees {
        for (acc, imp) in total.iter_mut().zip(tree.raw_importances()) {
            *acc += weight * imp;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        for v in &mut total {
            *v /= sum;
        }
    }
    total
}

// ============================================================================
// Gradient boosting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows drawn (without replacement) for each stage
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            seed: 42,
        }
    }
}

/// Squared-loss gradient boosting: each stage fits the current residuals
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    pub params: GradientBoostingParams,
    init: f64,
    stages: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            init: 0.0,
            stages: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        validate_rounds(self.params.n_estimators, self.params.learning_rate)?;
        if !(self.params.subsample > 0.0 && self.params.subsample <= 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "subsample",
                reason: format!("must be in (0, 1], got {}", self.params.subsample),
            }
            .into());
        }

        let n = x.nrows();
        let lr = self.params.learning_rate;
        self.init = y.iter().sum::<f64>() / n as f64;
        self.stages.clear();
        self.n_features = x.ncols();

        let mut current = vec![self.init; n];
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n_sub = ((self.params.subsample * n as f64).round() as usize).clamp(1, n);
        let mut all: Vec<usize> = (0..n).collect();

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();

            let indices = if n_sub < n {
                all.shuffle(&mut rng);
                all[..n_sub].to_vec()
            } else {
                all.clone()
            };

            let mut tree = DecisionTreeRegressor::new(stump_params(self.params.max_depth));
            tree.fit_indices(x, &residuals, &indices)?;
            for (i, p) in current.iter_mut().enumerate() {
                *p += lr * tree.predict_row(x, i);
            }
            self.stages.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        if self.stages.is_empty() {
            return Err(PipelineError::NotFitted {
                model: self.name().to_string(),
            }
            .into());
        }
        check_predict_input(x, self.n_features)?;
        let lr = self.params.learning_rate;
        Ok((0..x.nrows())
            .map(|i| {
                self.init
                    + self
                        .stages
                        .iter()
                        .map(|t| lr * t.predict_row(x, i))
                        .sum::<f64>()
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.stages.is_empty() {
            return None;
        }
        Some(pooled_importances(
            self.stages.iter().map(|t| (t, 1.0)),
            self.n_features,
        ))
    }
}

// ============================================================================
// AdaBoost.R2
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 1.0,
            max_depth: 3,
            seed: 42,
        }
    }
}

/// AdaBoost.R2 with linear loss. Each round trains on a weighted resample
/// and predictions are the weighted median over rounds.
#[derive(Debug, Clone)]
pub struct AdaBoostRegressor {
    pub params: AdaBoostParams,
    estimators: Vec<DecisionTreeRegressor>,
    weights: Vec<f64>,
    n_features: usize,
}

impl AdaBoostRegressor {
    pub fn new(params: AdaBoostParams) -> Self {
        Self {
            params,
            estimators: Vec::new(),
            weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.estimators.len()
    }
}

/// Smallest prediction whose cumulative weight reaches half the total
fn weighted_median(preds: &mut [(f64, f64)]) -> f64 {
    preds.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let total: f64 = preds.iter().map(|(_, w)| w).sum();
    let half = 0.5 * total;
    let mut cum = 0.0;
    for &(value, weight) in preds.iter() {
        cum += weight;
        if cum >= half {
            return value;
        }
    }
    preds.last().map_or(0.0, |p| p.0)
}

impl Regressor for AdaBoostRegressor {
    fn name(&self) -> &'static str {
        "AdaBoost"
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        validate_rounds(self.params.n_estimators, self.params.learning_rate)?;

        let n = x.nrows();
        let lr = self.params.learning_rate;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut sample_weight = vec![1.0 / n as f64; n];

        self.estimators.clear();
        self.weights.clear();
        self.n_features = x.ncols();

        for round in 0..self.params.n_estimators {
            let dist = WeightedIndex::new(&sample_weight).map_err(|e| {
                PipelineError::InvalidParameter {
                    name: "sample_weight",
                    reason: e.to_string(),
                }
            })?;
            let indices: Vec<usize> = (0..n).map(|_| dist.sample(&mut rng)).collect();

            let mut tree = DecisionTreeRegressor::new(stump_params(self.params.max_depth));
            tree.fit_indices(x, y, &indices)?;

            let mut errors: Vec<f64> = (0..n).map(|i| (tree.predict_row(x, i) - y[i]).abs()).collect();
            let max_error = errors.iter().copied().fold(0.0, f64::max);
            if max_error > 0.0 {
                for e in &mut errors {
                    *e /= max_error;
                }
            }

            let estimator_error: f64 = errors.iter().zip(&sample_weight).map(|(e, w)| e * w).sum();

            if estimator_error <= 0.0 {
                // Perfect fit on the weighted sample
                self.estimators.push(tree);
                self.weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                // Worse than chance; keep it only if it is the sole round
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            self.estimators.push(tree);
            self.weights.push(lr * (1.0 / beta).ln());

            if round + 1 < self.params.n_estimators {
                for (w, e) in sample_weight.iter_mut().zip(&errors) {
                    *w *= beta.powf((1.0 - e) * lr);
                }
                let total: f64 = sample_weight.iter().sum();
                if !(total > 0.0) {
                    break;
                }
                for w in &mut sample_weight {
                    *w /= total;
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        if self.estimators.is_empty() {
            return Err(PipelineError::NotFitted {
                model: self.name().to_string(),
            }
            .into());
        }
        check_predict_input(x, self.n_features)?;
        Ok((0..x.nrows())
            .map(|i| {
                let mut preds: Vec<(f64, f64)> = self
                    .estimators
                    .iter()
                    .zip(&self.weights)
                    .map(|(t, &w)| (t.predict_row(x, i), w))
                    .collect();
                weighted_median(&mut preds)
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.estimators.is_empty() {
            return None;
        }
        Some(pooled_importances(
            self.estimators.iter().zip(self.weights.iter().copied()),
            self.n_features,
        ))
    }
}
