//! Regression metrics and side-by-side model evaluation

use anyhow::Result;
use faer::Mat;
use serde::Serialize;

use super::error::PipelineError;
use super::models::{FittedModel, ModelKind};

/// Error metrics for one set of predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Compute MAE, MSE, RMSE and R².
///
/// A constant `y_true` has no variance to explain: R² is 1 for an exact
/// prediction and 0 otherwise.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics> {
    if y_true.is_empty() {
        return Err(PipelineError::EmptyTable { stage: "evaluation" }.into());
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeMismatch {
            context: "predictions vs targets",
            expected: y_true.len(),
            actual: y_pred.len(),
        }
        .into());
    }

    let n = y_true.len() as f64;
    let mae = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let mse = ss_res / n;

    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(RegressionMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        r2,
    })
}

/// Held-out metrics for one fitted model
#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub kind: ModelKind,
    pub name: String,
    pub metrics: RegressionMetrics,
    pub fit_seconds: f64,
}

/// Score every fitted model on the same held-out rows
pub fn evaluate_models(
    models: &[FittedModel],
    x_test: &Mat<f64>,
    y_test: &[f64],
) -> Result<Vec<ModelEvaluation>> {
    models
        .iter()
        .map(|fitted| {
            let predictions = fitted.model.predict(x_test)?;
            Ok(ModelEvaluation {
                kind: fitted.kind,
                name: fitted.kind.to_string(),
                metrics: evaluate(y_test, &predictions)?,
                fit_seconds: fitted.fit_time.as_secs_f64(),
            })
        })
        .collect()
}

/// The evaluation with the highest R²
pub fn best_model(evaluations: &[ModelEvaluation]) -> Option<&ModelEvaluation> {
    evaluations.iter().max_by(|a, b| {
        a.metrics
            .r2
            .partial_cmp(&b.metrics.r2)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let m = evaluate(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 6.0]).unwrap();
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.mse - 1.0).abs() < 1e-12);
        assert!((m.rmse - 1.0).abs() < 1e-12);
        // ss_tot = 5, ss_res = 4
        assert!((m.r2 - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target() {
        assert_eq!(evaluate(&[2.0, 2.0], &[2.0, 2.0]).unwrap().r2, 1.0);
        assert_eq!(evaluate(&[2.0, 2.0], &[2.0, 3.0]).unwrap().r2, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(evaluate(&[], &[]).is_err());
        assert!(evaluate(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_best_model_by_r2() {
        let make = |kind: ModelKind, r2: f64| ModelEvaluation {
            kind,
            name: kind.to_string(),
            metrics: RegressionMetrics {
                mae: 0.0,
                mse: 0.0,
                rmse: 0.0,
                r2,
            },
            fit_seconds: 0.0,
        };
        let evals = vec![
            make(ModelKind::LinearRegression, 0.4),
            make(ModelKind::RandomForest, 0.8),
            make(ModelKind::Mlp, -1.0),
        ];
        assert_eq!(best_model(&evals).unwrap().kind, ModelKind::RandomForest);
        assert!(best_model(&[]).is_none());
    }
}
