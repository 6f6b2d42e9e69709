//! Fully-connected ReLU network trained with Adam on squared error

use anyhow::Result;
use faer::Mat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{check_fit_input, check_predict_input, Regressor};
use crate::pipeline::error::PipelineError;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct MlpParams {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty on the weights
    pub alpha: f64,
    /// Upper bound on the minibatch size
    pub batch_size: usize,
    pub max_iter: usize,
    /// Minimum loss improvement that resets the patience counter
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_iter: 1000,
            tol: 1e-4,
            n_iter_no_change: 10,
            seed: 42,
        }
    }
}

impl MlpParams {
    fn validate(&self) -> Result<()> {
        if self.hidden_layers.iter().any(|&h| h == 0) {
            return Err(PipelineError::InvalidParameter {
                name: "hidden_layers",
                reason: "every layer needs at least one unit".to_string(),
            }
            .into());
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "learning_rate",
                reason: format!("must be positive, got {}", self.learning_rate),
            }
            .into());
        }
        if self.batch_size == 0 || self.max_iter == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "batch_size",
                reason: "batch_size and max_iter must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Adam first and second moment estimates for one parameter block
#[derive(Debug, Clone)]
struct Moments {
    m: Mat<f64>,
    v: Mat<f64>,
}

impl Moments {
    fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            m: Mat::zeros(rows, cols),
            v: Mat::zeros(rows, cols),
        }
    }

    fn step(&mut self, param: &mut Mat<f64>, grad: &Mat<f64>, lr_t: f64) {
        for j in 0..param.ncols() {
            for i in 0..param.nrows() {
                let g = grad[(i, j)];
                let m = BETA1 * self.m[(i, j)] + (1.0 - BETA1) * g;
                let v = BETA2 * self.v[(i, j)] + (1.0 - BETA2) * g * g;
                self.m[(i, j)] = m;
                self.v[(i, j)] = v;
                param[(i, j)] -= lr_t * m / (v.sqrt() + EPSILON);
            }
        }
    }
}

/// Multi-layer perceptron with identity output. Targets are standardised
/// internally and mapped back at prediction time.
#[derive(Debug, Clone)]
pub struct MlpRegressor {
    pub params: MlpParams,
    /// `weights[l]` is `fan_in × fan_out`
    weights: Vec<Mat<f64>>,
    /// Row vectors, `1 × fan_out`
    biases: Vec<Mat<f64>>,
    y_mean: f64,
    y_std: f64,
    n_iter: usize,
    loss_curve: Vec<f64>,
}

impl MlpRegressor {
    pub fn new(params: MlpParams) -> Self {
        Self {
            params,
            weights: Vec::new(),
            biases: Vec::new(),
            y_mean: 0.0,
            y_std: 1.0,
            n_iter: 0,
            loss_curve: Vec::new(),
        }
    }

    /// Epochs run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    fn init_layers(&mut self, n_features: usize, rng: &mut StdRng) {
        let mut sizes = vec![n_features];
        sizes.extend(self.params.hidden_layers.iter().copied());
        sizes.push(1);

        self.weights.clear();
        self.biases.clear();
        for w in sizes.windows(2) {
            let (fan_in, fan_out) = (w[0], w[1]);
            // Glorot uniform
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            self.weights
                .push(Mat::from_fn(fan_in, fan_out, |_, _| rng.gen_range(-bound..bound)));
            self.biases
                .push(Mat::from_fn(1, fan_out, |_, _| rng.gen_range(-bound..bound)));
        }
    }

    /// Activations for every layer, input first, output last
    fn forward(&self, x: &Mat<f64>) -> Vec<Mat<f64>> {
        let n_layers = self.weights.len();
        let mut activations = Vec::with_capacity(n_layers + 1);
        activations.push(x.clone());
        for l in 0..n_layers {
            let z = &activations[l] * &self.weights[l];
            let b = &self.biases[l];
            let last = l + 1 == n_layers;
            let a = Mat::from_fn(z.nrows(), z.ncols(), |i, j| {
                let v = z[(i, j)] + b[(0, j)];
                if last {
                    v
                } else {
                    v.max(0.0)
                }
            });
            activations.push(a);
        }
        activations
    }

    /// One minibatch: returns the batch loss and applies an Adam step
    fn train_batch(
        &mut self,
        xb: &Mat<f64>,
        yb: &[f64],
        moments: &mut [(Moments, Moments)],
        t: i32,
    ) -> f64 {
        let batch = xb.nrows() as f64;
        let alpha = self.params.alpha;
        let activations = self.forward(xb);
        let output = &activations[activations.len() - 1];

        let mut delta = Mat::from_fn(xb.nrows(), 1, |i, _| output[(i, 0)] - yb[i]);
        let loss = (0..xb.nrows()).map(|i| delta[(i, 0)].powi(2)).sum::<f64>() / (2.0 * batch);

        let lr_t = self.params.learning_rate * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));

        for l in (0..self.weights.len()).rev() {
            let a_prev = &activations[l];
            let w = &self.weights[l];
            let grad_w_raw = a_prev.transpose() * &delta;
            let grad_w = Mat::from_fn(w.nrows(), w.ncols(), |i, j| {
                (grad_w_raw[(i, j)] + alpha * w[(i, j)]) / batch
            });
            let grad_b = Mat::from_fn(1, delta.ncols(), |_, j| {
                (0..delta.nrows()).map(|i| delta[(i, j)]).sum::<f64>() / batch
            });

            if l > 0 {
                let back = delta.as_ref() * w.transpose();
                delta = Mat::from_fn(back.nrows(), back.ncols(), |i, j| {
                    if a_prev[(i, j)] > 0.0 {
                        back[(i, j)]
                    } else {
                        0.0
                    }
                });
            }

            let (mw, mb) = &mut moments[l];
            mw.step(&mut self.weights[l], &grad_w, lr_t);
            mb.step(&mut self.biases[l], &grad_b, lr_t);
        }
        loss
    }
}

impl Regressor for MlpRegressor {
    fn name(&self) -> &'static str {
        "MLP"
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        check_fit_input(x, y)?;
        self.params.validate()?;

        let n = x.nrows();
        let p = x.ncols();
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        self.y_mean = y.iter().sum::<f64>() / n as f64;
        let var = y.iter().map(|v| (v - self.y_mean).powi(2)).sum::<f64>() / n as f64;
        self.y_std = if var > 0.0 { var.sqrt() } else { 1.0 };
        let y_scaled: Vec<f64> = y.iter().map(|v| (v - self.y_mean) / self.y_std).collect();

        self.init_layers(p, &mut rng);
        let mut moments: Vec<(Moments, Moments)> = self
            .weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| {
                (
                    Moments::zeros(w.nrows(), w.ncols()),
                    Moments::zeros(b.nrows(), b.ncols()),
                )
            })
            .collect();

        let batch_size = self.params.batch_size.min(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut t = 0i32;
        self.loss_curve.clear();
        self.n_iter = 0;

        for _ in 0..self.params.max_iter {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for chunk in order.chunks(batch_size) {
                let xb = Mat::from_fn(chunk.len(), p, |i, j| x[(chunk[i], j)]);
                let yb: Vec<f64> = chunk.iter().map(|&i| y_scaled[i]).collect();
                t = t.saturating_add(1);
                epoch_loss += self.train_batch(&xb, &yb, &mut moments, t) * chunk.len() as f64;
            }

            let penalty: f64 = self
                .weights
                .iter()
                .map(|w| {
                    let mut s = 0.0;
                    for j in 0..w.ncols() {
                        for i in 0..w.nrows() {
                            s += w[(i, j)] * w[(i, j)];
                        }
                    }
                    s
                })
                .sum();
            let loss = epoch_loss / n as f64 + 0.5 * self.params.alpha * penalty / n as f64;

            self.n_iter += 1;
            self.loss_curve.push(loss);

            if !loss.is_finite() {
                return Err(PipelineError::InvalidParameter {
                    name: "learning_rate",
                    reason: "training loss diverged".to_string(),
                }
                .into());
            }

            if loss > best_loss - self.params.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);

            if no_improvement > self.params.n_iter_no_change {
                break;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        let Some(first) = self.weights.first() else {
            return Err(PipelineError::NotFitted {
                model: self.name().to_string(),
            }
            .into());
        };
        check_predict_input(x, first.nrows())?;
        let activations = self.forward(x);
        let output = &activations[activations.len() - 1];
        Ok((0..x.nrows())
            .map(|i| output[(i, 0)] * self.y_std + self.y_mean)
            .collect())
    }
}
