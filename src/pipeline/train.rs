//! End-to-end training run: clean, diagnose, split, encode, scale, fit,
//! evaluate, tune and package the artifact.
//!
//! Every stage takes the previous stage's output by reference and returns a
//! new value, so a stage can be rerun or tested on its own.

use std::time::Instant;

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::encode::{cardinalities, LabelEncoder, MultiLabelEncoder, OneHotEncoder};
use super::explore::{explore_movies, ExplorationReport};
use super::features::{take_values, target_vector, FeatureMatrix};
use super::impute::{clean_dataset, CleaningReport, KnnImputer, TrainingFills, Weighting};
use super::metrics::{best_model, evaluate, evaluate_models, ModelEvaluation, RegressionMetrics};
use super::models::{train_models, ModelKind, Regressor};
use super::outliers::{outlier_summary, OutlierCount};
use super::persist::ModelArtifact;
use super::scale::{AffineScaler, FeatureScaler, MinMaxScaler, RobustScaler, StandardScaler};
use super::schema::{categorical_columns, column_names, is_numeric, MovieSchema};
use super::select::{rank_features, SelectionReport};
use super::split::{train_test_split, SplitIndices};
use super::tune::{randomized_search, ForestParamGrid, SearchConfig, TrialResult};
use crate::pipeline::models::ForestParams;
use crate::utils::progress::{create_spinner, finish_with_success};
use crate::utils::styling::{print_count, print_info, print_step_header, print_step_time, print_success};

/// Settings for one training run
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub test_size: f64,
    pub seed: u64,
    pub n_neighbors: usize,
    pub weighting: Weighting,
    /// Length of each feature ranking
    pub top_k: usize,
    /// Categorical columns with more distinct training values are left out
    pub max_categories: usize,
    pub models: Vec<ModelKind>,
    pub grid: ForestParamGrid,
    pub search: SearchConfig,
    /// Tune on the standardised features instead of the raw encoded ones
    pub tune_on_scaled: bool,
    /// Median/IQR-scale numeric columns before the min-max and standard steps
    pub robust_scale: bool,
    /// Build the exploratory views of the cleaned table
    pub explore: bool,
    /// Print step headers and timings
    pub verbose: bool,
    /// Number shown on the first step header
    pub first_step: u8,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            n_neighbors: 5,
            weighting: Weighting::default(),
            top_k: 10,
            max_categories: 100,
            models: ModelKind::ALL.to_vec(),
            grid: ForestParamGrid::default(),
            search: SearchConfig::default(),
            tune_on_scaled: false,
            robust_scale: false,
            explore: false,
            verbose: false,
            first_step: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub seconds: f64,
}

/// Outcome of the hyperparameter search
#[derive(Debug, Clone, Serialize)]
pub struct TuningSummary {
    pub best_params: ForestParams,
    /// Mean cross-validated negative MSE
    pub best_score: f64,
    pub trials: Vec<TrialResult>,
    /// Held-out metrics of the refit best forest
    pub test_metrics: RegressionMetrics,
    pub on_scaled_features: bool,
}

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub cleaning: CleaningReport,
    pub exploration: Option<ExplorationReport>,
    pub outliers: Vec<OutlierCount>,
    pub label_inspection: Option<LabelEncoder>,
    pub n_train: usize,
    pub n_test: usize,
    pub selection: SelectionReport,
    /// Categorical columns left out for having too many categories
    pub excluded_categoricals: Vec<(String, usize)>,
    pub encoded_columns: Vec<String>,
    /// Delimited columns expanded into one indicator per token
    pub multi_label_columns: Vec<String>,
    pub feature_names: Vec<String>,
    pub evaluations: Vec<ModelEvaluation>,
    pub tuning: TuningSummary,
    pub artifact: ModelArtifact,
    pub timings: Vec<StageTiming>,
}

impl TrainingOutcome {
    pub fn best_evaluation(&self) -> Option<&ModelEvaluation> {
        best_model(&self.evaluations)
    }
}

/// Step headers and timings for the stages of a run
struct StageLog {
    verbose: bool,
    next_step: u8,
    timings: Vec<StageTiming>,
}

impl StageLog {
    fn begin(&mut self, title: &str) -> Instant {
        if self.verbose {
            print_step_header(self.next_step, title);
        }
        self.next_step = self.next_step.saturating_add(1);
        Instant::now()
    }

    fn end(&mut self, stage: &str, start: Instant) {
        let elapsed = start.elapsed();
        if self.verbose {
            print_step_time(elapsed);
        }
        self.timings.push(StageTiming {
            stage: stage.to_string(),
            seconds: elapsed.as_secs_f64(),
        });
    }

    fn success(&self, message: &str) {
        if self.verbose {
            print_success(message);
        }
    }

    fn info(&self, message: &str) {
        if self.verbose {
            print_info(message);
        }
    }
}

/// Rows of a table at the given indices, in original row order
fn frame_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let mut mask = vec![false; df.height()];
    for &i in indices {
        mask[i] = true;
    }
    Ok(df.filter(&BooleanChunked::from_slice("mask".into(), &mask))?)
}

/// Numeric matrix columns that are not indicator columns
fn plain_numeric_columns(
    names: &[String],
    encoder: &OneHotEncoder,
    multi_label: &MultiLabelEncoder,
) -> Vec<bool> {
    let mut indicators = encoder.feature_names();
    indicators.extend(multi_label.feature_names());
    names.iter().map(|n| !indicators.contains(n)).collect()
}

/// Run the whole training pipeline on a loaded movie table
pub fn run_training(
    df: &DataFrame,
    schema: &MovieSchema,
    config: &TrainConfig,
) -> Result<TrainingOutcome> {
    let mut log = StageLog {
        verbose: config.verbose,
        next_step: config.first_step,
        timings: Vec::new(),
    };

    // Cleaning
    let start = log.begin("Cleaning");
    let imputer = KnnImputer::new(config.n_neighbors, config.weighting);
    let (cleaned, cleaning) = clean_dataset(df, schema, &imputer)?;
    if config.verbose {
        print_count(
            "missing cells filled",
            cleaning.total_filled(),
            Some(&format!("({}-NN, {} weighting)", config.n_neighbors, config.weighting)),
        );
        for column in &cleaning.remaining.dropped_all_missing {
            print_info(&format!("Dropped all-missing column '{}'", column));
        }
    }
    log.end("clean", start);

    let exploration = if config.explore {
        let start = log.begin("Exploration");
        let report = explore_movies(&cleaned, schema)?;
        log.info(&format!(
            "{} numeric summaries, {} grouped views",
            report.summaries.len(),
            report.grouped.len() + report.counts.len()
        ));
        log.end("explore", start);
        Some(report)
    } else {
        None
    };

    // Outlier diagnostics
    let start = log.begin("Outlier Diagnostics");
    let numeric_present: Vec<String> = schema
        .impute_numeric
        .iter()
        .filter(|c| {
            cleaned
                .column(c)
                .map(|col| is_numeric(col.dtype()))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    let outliers = outlier_summary(&cleaned, &numeric_present)?;
    let flagged: usize = outliers.iter().map(|o| o.outliers).sum();
    log.info(&format!(
        "{} IQR outlier cells across {} columns (reported, not removed)",
        flagged,
        outliers.len()
    ));
    log.end("outliers", start);

    let label_inspection = match schema.label_inspect.as_deref() {
        Some(column) if column_names(&cleaned).iter().any(|c| c == column) => {
            let encoder = LabelEncoder::fit(&cleaned, column)?;
            log.info(&format!(
                "'{}' label-encodes to {} classes",
                column,
                encoder.classes.len()
            ));
            Some(encoder)
        }
        _ => None,
    };

    // Split
    let start = log.begin("Train/Test Split");
    let split: SplitIndices = train_test_split(cleaned.height(), config.test_size, config.seed)?;
    log.success(&format!(
        "{} training rows, {} test rows",
        split.train.len(),
        split.test.len()
    ));
    log.end("split", start);

    // Feature rankings
    let start = log.begin("Feature Ranking");
    let spinner = config.verbose.then(|| create_spinner("Ranking features..."));
    let selection = rank_features(&cleaned, schema, &split, config.top_k, config.seed)?;
    if let Some(pb) = &spinner {
        finish_with_success(
            pb,
            &format!("Ranked {} candidate features", selection.candidates.len()),
        );
    }
    log.end("select", start);

    // Encoding
    let start = log.begin("Encoding");
    let train_frame = frame_rows(&cleaned, &split.train)?;
    let present = column_names(&cleaned);
    let multi_columns: Vec<String> = schema
        .multi_label
        .iter()
        .filter(|c| present.contains(c) && **c != schema.target)
        .cloned()
        .collect();
    let categorical: Vec<String> = categorical_columns(&cleaned)
        .into_iter()
        .filter(|c| *c != schema.target && !multi_columns.contains(c))
        .collect();
    let (encode_columns, excluded): (Vec<(String, usize)>, Vec<(String, usize)>) =
        cardinalities(&train_frame, &categorical)?
            .into_iter()
            .partition(|(_, n)| *n <= config.max_categories);
    let encode_columns: Vec<String> = encode_columns.into_iter().map(|(c, _)| c).collect();
    let excluded_names: Vec<String> = excluded.iter().map(|(c, _)| c.clone()).collect();

    let mut fill_exclude = excluded_names.clone();
    fill_exclude.push(schema.target.clone());
    let fills = TrainingFills::fit(&train_frame, &fill_exclude)?;

    let multi_label =
        MultiLabelEncoder::fit(&train_frame, &multi_columns, &schema.multi_label_separator)?;
    let encoder = OneHotEncoder::fit(&train_frame, &encode_columns, true)?;
    let expanded = multi_label.transform_available(&cleaned.drop_many(&excluded_names))?;
    let encoded = encoder.transform(&expanded)?;
    let matrix = FeatureMatrix::from_frame(&encoded, &[schema.target.clone()])?;
    let y = target_vector(&cleaned, &schema.target)?;
    if config.verbose {
        print_count(
            "model features",
            matrix.ncols(),
            Some(&format!(
                "({} one-hot indicators from {} columns, {} token indicators from {} columns)",
                encoder.feature_names().len(),
                encode_columns.len(),
                multi_label.feature_names().len(),
                multi_columns.len()
            )),
        );
        for (column, n) in &excluded {
            print_info(&format!(
                "Left out '{}' ({} categories > {})",
                column, n, config.max_categories
            ));
        }
    }
    log.end("encode", start);

    // Scaling, fit on training rows only
    let start = log.begin("Scaling");
    let x_train_raw = matrix.select_rows(&split.train).data;
    let x_test_raw = matrix.select_rows(&split.test).data;
    let y_train = take_values(&y, &split.train);
    let y_test = take_values(&y, &split.test);

    let robust = if config.robust_scale {
        let mut robust = RobustScaler::fit(&x_train_raw)?;
        for (j, plain) in plain_numeric_columns(&matrix.names, &encoder, &multi_label)
            .into_iter()
            .enumerate()
        {
            if !plain {
                robust.median[j] = 0.0;
                robust.iqr[j] = 1.0;
            }
        }
        Some(robust)
    } else {
        None
    };
    let (base_train, base_test) = match &robust {
        Some(r) => (r.transform(&x_train_raw)?, r.transform(&x_test_raw)?),
        None => (x_train_raw.clone(), x_test_raw.clone()),
    };
    let min_max = MinMaxScaler::fit(&base_train)?;
    let mm_train = min_max.transform(&base_train)?;
    let standard = StandardScaler::fit(&mm_train)?;
    let x_train: Mat<f64> = standard.transform(&mm_train)?;
    let x_test: Mat<f64> = standard.transform(&min_max.transform(&base_test)?)?;

    let chain = match &robust {
        Some(r) => AffineScaler::from_chain(&[r, &min_max, &standard])?,
        None => AffineScaler::from_chain(&[&min_max, &standard])?,
    };
    log.success(if config.robust_scale {
        "Robust, min-max and standard scalers fit on training rows"
    } else {
        "Min-max and standard scalers fit on training rows"
    });
    log.end("scale", start);

    // Model comparison
    let start = log.begin("Training Models");
    let spinner = config
        .verbose
        .then(|| create_spinner(&format!("Fitting {} models...", config.models.len())));
    let fitted = train_models(&x_train, &y_train, &config.models, config.seed)?;
    if let Some(pb) = &spinner {
        finish_with_success(pb, &format!("Fitted {} models", fitted.len()));
    }
    log.end("train", start);

    let start = log.begin("Evaluation");
    let evaluations = evaluate_models(&fitted, &x_test, &y_test)?;
    if let Some(best) = best_model(&evaluations) {
        log.success(&format!("Best model: {} (R² {:.4})", best.name, best.metrics.r2));
    }
    log.end("evaluate", start);

    // Hyperparameter search
    let start = log.begin("Hyperparameter Search");
    let (tune_train, tune_test) = if config.tune_on_scaled {
        (&x_train, &x_test)
    } else {
        (&x_train_raw, &x_test_raw)
    };
    let search_config = SearchConfig {
        show_progress: config.verbose,
        ..config.search
    };
    let search = randomized_search(tune_train, &y_train, &config.grid, &search_config)?;
    let tuned_predictions = search.best_model.predict(tune_test)?;
    let test_metrics = evaluate(&y_test, &tuned_predictions)?;
    log.success(&format!(
        "Best of {} trials: CV neg-MSE {:.4e}, test R² {:.4}",
        search.trials.len(),
        search.best_score,
        test_metrics.r2
    ));
    log.end("tune", start);

    let artifact = ModelArtifact::new(
        &schema.target,
        matrix.names.clone(),
        encoder,
        config.tune_on_scaled.then_some(chain),
        search.best_params,
        search.best_score,
        search.best_model,
    )
    .with_fills(fills)
    .with_multi_label(multi_label);

    Ok(TrainingOutcome {
        cleaning,
        exploration,
        outliers,
        label_inspection,
        n_train: split.train.len(),
        n_test: split.test.len(),
        selection,
        excluded_categoricals: excluded,
        encoded_columns: encode_columns,
        multi_label_columns: multi_columns,
        feature_names: matrix.names,
        evaluations,
        tuning: TuningSummary {
            best_params: search.best_params,
            best_score: search.best_score,
            trials: search.trials,
            test_metrics,
            on_scaled_features: config.tune_on_scaled,
        },
        artifact,
        timings: log.timings,
    })
}
