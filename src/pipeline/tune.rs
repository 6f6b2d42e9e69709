//! Randomized hyperparameter search for the random forest

use anyhow::Result;
use faer::Mat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use super::error::PipelineError;
use super::features::{take_rows, take_values};
use super::models::{ForestParams, RandomForestRegressor, Regressor};
use super::split::k_fold;
use crate::utils::progress::create_trial_bar;

/// Candidate values for each searchable forest parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ForestParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 150],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
        }
    }
}

impl ForestParamGrid {
    /// Number of distinct grid points
    pub fn size(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    /// Decode a flat grid index (mixed radix, last parameter fastest)
    pub fn point(&self, mut index: usize, seed: u64) -> ForestParams {
        let leaf = self.min_samples_leaf[index % self.min_samples_leaf.len()];
        index /= self.min_samples_leaf.len();
        let split = self.min_samples_split[index % self.min_samples_split.len()];
        index /= self.min_samples_split.len();
        let depth = self.max_depth[index % self.max_depth.len()];
        index /= self.max_depth.len();
        let trees = self.n_estimators[index % self.n_estimators.len()];

        ForestParams {
            n_estimators: trees,
            max_depth: depth,
            min_samples_split: split,
            min_samples_leaf: leaf,
            seed,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchConfig {
    pub n_iter: usize,
    pub cv: usize,
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            cv: 3,
            seed: 42,
            show_progress: false,
        }
    }
}

/// Cross-validated score of one sampled grid point
#[derive(Debug, Clone, Serialize)]
pub struct TrialResult {
    pub params: ForestParams,
    /// Negative MSE per validation fold
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: ForestParams,
    /// Mean negative MSE of the best trial
    pub best_score: f64,
    pub trials: Vec<TrialResult>,
    /// Best parameters refit on all training rows
    pub best_model: RandomForestRegressor,
}

fn run_trial(
    x: &Mat<f64>,
    y: &[f64],
    folds: &[(Vec<usize>, Vec<usize>)],
    params: ForestParams,
) -> Result<TrialResult> {
    let mut fold_scores = Vec::with_capacity(folds.len());
    for (train, validation) in folds {
        let mut forest = RandomForestRegressor::new(params);
        forest.fit(&take_rows(x, train), &take_values(y, train))?;
        let predictions = forest.predict(&take_rows(x, validation))?;
        let mse = predictions
            .iter()
            .zip(validation.iter().map(|&i| y[i]))
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / validation.len() as f64;
        fold_scores.push(-mse);
    }
    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
    Ok(TrialResult {
        params,
        fold_scores,
        mean_score,
    })
}

/// Sample `n_iter` distinct grid points, score each by k-fold negative MSE,
/// and refit the best on all rows.
///
/// Trials run in parallel; the best is chosen only after every trial has
/// finished, and any failing trial fails the search.
pub fn randomized_search(
    x: &Mat<f64>,
    y: &[f64],
    grid: &ForestParamGrid,
    config: &SearchConfig,
) -> Result<SearchResult> {
    if grid.size() == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "grid",
            reason: "every parameter needs at least one candidate".to_string(),
        }
        .into());
    }
    if config.n_iter == 0 {
        return Err(PipelineError::InvalidParameter {
            name: "n_iter",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }

    let folds = k_fold(x.nrows(), config.cv)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let n_samples = config.n_iter.min(grid.size());
    let sampled: Vec<ForestParams> = rand::seq::index::sample(&mut rng, grid.size(), n_samples)
        .into_iter()
        .map(|idx| grid.point(idx, config.seed))
        .collect();

    let pb = create_trial_bar(sampled.len() as u64, config.cv, config.show_progress);

    let trials: Vec<TrialResult> = sampled
        .par_iter()
        .map(|params| {
            let result = run_trial(x, y, &folds, *params);
            pb.inc(1);
            result
        })
        .collect::<Result<_>>()?;
    pb.finish_and_clear();

    let best = trials
        .iter()
        .max_by(|a, b| {
            a.mean_score
                .partial_cmp(&b.mean_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(PipelineError::EmptyTable { stage: "search" })?;
    let best_params = best.params;
    let best_score = best.mean_score;

    let mut best_model = RandomForestRegressor::new(best_params);
    best_model.fit(x, y)?;

    Ok(SearchResult {
        best_params,
        best_score,
        trials,
        best_model,
    })
}
