//! Regression models
//!
//! Five off-the-shelf regressors share the `Regressor` trait so training and
//! evaluation can run over a single collection instead of five copies of the
//! same block.

mod boosting;
mod forest;
mod linear;
mod mlp;
mod tree;

use std::time::{Duration, Instant};

use anyhow::Result;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

pub use boosting::{AdaBoostParams, AdaBoostRegressor, GradientBoostingParams, GradientBoostingRegressor};
pub use forest::{ForestParams, RandomForestRegressor};
pub use linear::LinearRegression;
pub use mlp::{MlpParams, MlpRegressor};
pub use tree::{DecisionTreeRegressor, TreeParams};

/// A model mapping a feature matrix to one prediction per row
pub trait Regressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()>;

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>>;

    /// Normalised impurity-based importances, for models that have them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Reject empty or misaligned training input
pub(crate) fn check_fit_input(x: &Mat<f64>, y: &[f64]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::EmptyTable { stage: "model fit" }.into());
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch {
            context: "feature rows vs target length",
            expected: x.nrows(),
            actual: y.len(),
        }
        .into());
    }
    Ok(())
}

/// Reject prediction input whose width differs from training
pub(crate) fn check_predict_input(x: &Mat<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(PipelineError::ShapeMismatch {
            context: "prediction feature columns",
            expected: n_features,
            actual: x.ncols(),
        }
        .into());
    }
    Ok(())
}

/// The model families trained by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    RandomForest,
    Mlp,
    GradientBoosting,
    AdaBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::LinearRegression,
        ModelKind::RandomForest,
        ModelKind::Mlp,
        ModelKind::GradientBoosting,
        ModelKind::AdaBoost,
    ];

    /// A fresh, unfitted model of this family with its default parameters
    pub fn build(&self, seed: u64) -> Box<dyn Regressor> {
        match self {
            ModelKind::LinearRegression => Box::new(LinearRegression::default()),
            ModelKind::RandomForest => Box::new(RandomForestRegressor::new(ForestParams {
                seed,
                ..Default::default()
            })),
            ModelKind::Mlp => Box::new(MlpRegressor::new(MlpParams {
                seed,
                ..Default::default()
            })),
            ModelKind::GradientBoosting => {
                Box::new(GradientBoostingRegressor::new(GradientBoostingParams {
                    seed,
                    ..Default::default()
                }))
            }
            ModelKind::AdaBoost => Box::new(AdaBoostRegressor::new(AdaBoostParams {
                seed,
                ..Default::default()
            })),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Mlp => "MLP",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::AdaBoost => "AdaBoost",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").replace(' ', "_").as_str() {
            "linear" | "linear_regression" | "ols" => Ok(ModelKind::LinearRegression),
            "random_forest" | "forest" | "rf" => Ok(ModelKind::RandomForest),
            "mlp" | "neural_network" => Ok(ModelKind::Mlp),
            "gradient_boosting" | "gbr" => Ok(ModelKind::GradientBoosting),
            "adaboost" | "ada_boost" => Ok(ModelKind::AdaBoost),
            _ => Err(format!(
                "Unknown model: '{}'. Use linear, random_forest, mlp, gradient_boosting or adaboost.",
                s
            )),
        }
    }
}

/// A fitted model and how long it took to fit
pub struct FittedModel {
    pub kind: ModelKind,
    pub model: Box<dyn Regressor>,
    pub fit_time: Duration,
}

/// Fit one model of each requested family on the same training matrix
pub fn train_models(
    x: &Mat<f64>,
    y: &[f64],
    kinds: &[ModelKind],
    seed: u64,
) -> Result<Vec<FittedModel>> {
    kinds
        .iter()
        .map(|kind| {
            let start = Instant::now();
            let mut model = kind.build(seed);
            model.fit(x, y)?;
            Ok(FittedModel {
                kind: *kind,
                model,
                fit_time: start.elapsed(),
            })
        })
        .collect()
}
