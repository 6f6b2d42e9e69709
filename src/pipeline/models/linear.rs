//! Ordinary least squares with intercept

use anyhow::Result;
use faer::prelude::SpSolver;
use faer::{Mat, Side};

use super::{check_fit_input, check_predict_input, Regressor};
use crate::pipeline::error::PipelineError;

/// Relative ridge added to the diagonal when `XᵀX` is not positive definite
const JITTER_START: f64 = 1e-10;
const JITTER_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    fitted: bool,
}

/// Solve `a · x = b` for symmetric positive definite `a` with faer's LLᵀ
/// factorisation. Returns `None` if the factorisation fails or a pivot is
/// not clearly positive.
fn cholesky_solve(a: &Mat<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let llt = a.cholesky(Side::Lower).ok()?;

    // A pivot that cancels to rounding noise marks a dependent column
    let l = llt.compute_l();
    let degenerate = (0..a.nrows()).any(|j| {
        let pivot = l[(j, j)] * l[(j, j)];
        !pivot.is_finite() || pivot <= a[(j, j)].abs() * 1e-12
    });
    if degenerate {
        return None;
    }

    let rhs = Mat::from_fn(b.len(), 1, |i, _| b[i]);
    let x = llt.solve(rhs.as_ref());
    let solution: Vec<f64> = (0..b.len()).map(|i| x[(i, 0)]).collect();
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}

impl Regressor for LinearRegression {
    fn name(&self) -> &'static str {
        "Linear Regression"
    }

    /// Fit on centred data so the intercept is recovered from the means and
    /// the normal equations stay well conditioned.
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();
        let p = x.ncols();

        let x_mean: Vec<f64> = (0..p)
            .map(|j| (0..n).map(|i| x[(i, j)]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        if p == 0 {
            self.coefficients = Vec::new();
            self.intercept = y_mean;
            self.fitted = true;
            return Ok(());
        }

        let xc = Mat::from_fn(n, p, |i, j| x[(i, j)] - x_mean[j]);
        let yc = Mat::from_fn(n, 1, |i, _| y[i] - y_mean);

        let gram = xc.transpose() * &xc;
        let rhs_mat = xc.transpose() * &yc;
        let rhs: Vec<f64> = (0..p).map(|j| rhs_mat[(j, 0)]).collect();

        let trace: f64 = (0..p).map(|j| gram[(j, j)]).sum::<f64>();
        let scale = if trace > 0.0 { trace / p as f64 } else { 1.0 };

        let mut solution = cholesky_solve(&gram, &rhs);
        let mut jitter = JITTER_START;
        let mut attempts = 0;
        while solution.is_none() && attempts < JITTER_ATTEMPTS {
            let lambda = jitter * scale;
            let ridged = Mat::from_fn(p, p, |i, j| {
                if i == j {
                    gram[(i, j)] + lambda
                } else {
                    gram[(i, j)]
                }
            });
            solution = cholesky_solve(&ridged, &rhs);
            jitter *= 100.0;
            attempts += 1;
        }

        let coefficients = solution.ok_or_else(|| PipelineError::InvalidParameter {
            name: "features",
            reason: "normal equations are singular even after regularisation".to_string(),
        })?;

        self.intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();
        self.coefficients = coefficients;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(PipelineError::NotFitted {
                model: self.name().to_string(),
            }
            .into());
        }
        check_predict_input(x, self.coefficients.len())?;
        Ok((0..x.nrows())
            .map(|i| {
                self.intercept
                    + self
                        .coefficients
                        .iter()
                        .enumerate()
                        .map(|(j, c)| c * x[(i, j)])
                        .sum::<f64>()
            })
            .collect())
    }
}
