//! JSON report of a training run
//!
//! Records what went in (input, target, seed, split), what the cleaning and
//! ranking stages found, how every model scored and what the search chose.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::metrics::{best_model, ModelEvaluation};
use crate::pipeline::select::SelectionReport;
use crate::pipeline::train::{StageTiming, TrainingOutcome, TuningSummary};

/// Run settings recorded in the report metadata
pub struct ReportParams<'a> {
    pub input_file: &'a str,
    pub target_column: &'a str,
    pub model_file: &'a str,
    pub seed: u64,
    pub test_size: f64,
    pub n_neighbors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub timestamp: String,
    pub boxoffice_version: String,
    pub input_file: String,
    pub target_column: String,
    pub model_file: String,
    pub seed: u64,
    pub test_size: f64,
    pub n_neighbors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleaningEntry {
    pub cells_filled: usize,
    pub knn_filled: Vec<(String, usize)>,
    pub dropped_all_missing: Vec<String>,
    pub outlier_cells: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataEntry {
    pub train_rows: usize,
    pub test_rows: usize,
    pub features: usize,
    pub encoded_columns: Vec<String>,
    /// Delimited columns expanded into token indicators
    pub multi_label_columns: Vec<String>,
    /// (column, distinct training values)
    pub excluded_categoricals: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub cleaning: CleaningEntry,
    pub data: DataEntry,
    pub selection: SelectionReport,
    pub models: Vec<ModelEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_model: Option<String>,
    pub tuning: TuningSummary,
    pub timings: Vec<StageTiming>,
}

impl RunReport {
    pub fn from_outcome(outcome: &TrainingOutcome, params: &ReportParams) -> Self {
        Self {
            metadata: RunMetadata {
                timestamp: Utc::now().to_rfc3339(),
                boxoffice_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: params.input_file.to_string(),
                target_column: params.target_column.to_string(),
                model_file: params.model_file.to_string(),
                seed: params.seed,
                test_size: params.test_size,
                n_neighbors: params.n_neighbors,
            },
            cleaning: CleaningEntry {
                cells_filled: outcome.cleaning.total_filled(),
                knn_filled: outcome.cleaning.knn_filled.clone(),
                dropped_all_missing: outcome.cleaning.remaining.dropped_all_missing.clone(),
                outlier_cells: outcome.outliers.iter().map(|o| o.outliers).sum(),
            },
            data: DataEntry {
                train_rows: outcome.n_train,
                test_rows: outcome.n_test,
                features: outcome.feature_names.len(),
                encoded_columns: outcome.encoded_columns.clone(),
                multi_label_columns: outcome.multi_label_columns.clone(),
                excluded_categoricals: outcome.excluded_categoricals.clone(),
            },
            selection: outcome.selection.clone(),
            models: outcome.evaluations.clone(),
            best_model: best_model(&outcome.evaluations).map(|e| e.name.clone()),
            tuning: outcome.tuning.clone(),
            timings: outcome.timings.clone(),
        }
    }
}

/// Write the run report as pretty JSON
pub fn export_run_report(
    output_path: &Path,
    outcome: &TrainingOutcome,
    params: &ReportParams,
) -> Result<()> {
    let report = RunReport::from_outcome(outcome, params);
    let json =
        serde_json::to_string_pretty(&report).context("Failed to serialize run report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write run report to {}", output_path.display()))?;

    Ok(())
}
