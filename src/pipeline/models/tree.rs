//! CART regression tree with squared-error splits

use anyhow::Result;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::{check_fit_input, check_predict_input, Regressor};
use crate::pipeline::error::PipelineError;

/// Relative gap below which two sorted feature values count as equal
const FEATURE_TOLERANCE: f64 = 1e-7;

/// Threshold between two adjacent sorted values, or `None` when they are
/// equal within tolerance. The midpoint falls back to the lower value when
/// rounding would put it on the upper one, so neither child ends up empty.
fn split_threshold(value: f64, next: f64) -> Option<f64> {
    let scale = value.abs().max(next.abs()).max(1.0);
    if next - value <= FEATURE_TOLERANCE * scale {
        return None;
    }
    let mid = value + (next - value) / 2.0;
    if mid >= next || !mid.is_finite() {
        Some(value)
    } else {
        Some(mid)
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "min_samples_split",
                reason: format!("must be at least 2, got {}", self.min_samples_split),
            }
            .into());
        }
        if self.min_samples_leaf < 1 {
            return Err(PipelineError::InvalidParameter {
                name: "min_samples_leaf",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Best split found for one node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Reduction in total squared error
    gain: f64,
}

/// Sum of squared deviations from the mean
fn sse(sum: f64, sum_sq: f64, n: f64) -> f64 {
    (sum_sq - sum * sum / n).max(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub params: TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    n_features: usize,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            importances: Vec::new(),
            n_features: 0,
        }
    }

    /// Fit on the rows listed in `indices` (duplicates allowed, as in a
    /// bootstrap sample)
    pub fn fit_indices(&mut self, x: &Mat<f64>, y: &[f64], indices: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        self.params.validate()?;
        if indices.is_empty() {
            return Err(PipelineError::EmptyTable { stage: "tree fit" }.into());
        }

        self.n_features = x.ncols();
        self.nodes.clear();
        self.importances = vec![0.0; x.ncols()];

        let mut samples = indices.to_vec();
        self.grow(x, y, &mut samples, 0);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    /// Grow a subtree over `samples` and return its node index
    fn grow(&mut self, x: &Mat<f64>, y: &[f64], samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let sum_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
        let mean = sum / n as f64;
        let node_sse = sse(sum, sum_sq, n as f64);

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        let too_small = n < self.params.min_samples_split || n < 2 * self.params.min_samples_leaf;

        let split = if depth_reached || too_small || node_sse <= 1e-12 {
            None
        } else {
            self.best_split(x, y, samples, sum, sum_sq)
        };

        let Some(split) = split else {
            self.nodes.push(Node::Leaf { value: mean });
            return self.nodes.len() - 1;
        };

        self.importances[split.feature] += split.gain;

        // Partition in place: left side holds values <= threshold
        let mut boundary = 0;
        for k in 0..n {
            if x[(samples[k], split.feature)] <= split.threshold {
                samples.swap(k, boundary);
                boundary += 1;
            }
        }

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.grow(x, y, left_samples, depth + 1);
        let right = self.grow(x, y, right_samples, depth + 1);

        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(
        &self,
        x: &Mat<f64>,
        y: &[f64],
        samples: &[usize],
        total_sum: f64,
        total_sum_sq: f64,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;
        let parent_sse = sse(total_sum, total_sum_sq, n as f64);

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..x.ncols() {
            pairs.clear();
            pairs.extend(samples.iter().map(|&i| (x[(i, feature)], y[i])));
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            let mut left_sum_sq = 0.0;
            for k in 0..n - 1 {
                let (value, target) = pairs[k];
                left_sum += target;
                left_sum_sq += target * target;

                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let Some(threshold) = split_threshold(value, pairs[k + 1].0) else {
                    continue;
                };

                let children = sse(left_sum, left_sum_sq, left_n as f64)
                    + sse(
                        total_sum - left_sum,
                        total_sum_sq - left_sum_sq,
                        right_n as f64,
                    );
                let gain = parent_sse - children;

                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Prediction for a single row accessor
    pub fn predict_row(&self, x: &Mat<f64>, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[(row, *feature)] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }

    pub(crate) fn raw_importances(&self) -> &[f64] {
        &self.importances
    }
}

impl Regressor for DecisionTreeRegressor {
    fn name(&self) -> &'static str {
        "Decision Tree"
    }

    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<()> {
        let all: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &all)
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted {
                model: self.name().to_string(),
            }
            .into());
        }
        check_predict_input(x, self.n_features)?;
        Ok((0..x.nrows()).map(|i| self.predict_row(x, i)).collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }
}
