//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::pipeline::Weighting;

/// Box-office - Predict film gross revenue from movie metadata
#[derive(Parser, Debug)]
#[command(name = "boxoffice")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Input table options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

/// Cleaning options shared by `train` and `explore`
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Target column name (box-office gross)
    #[arg(short, long, default_value = "gross")]
    pub target: String,

    /// Neighbours used for k-NN imputation of numeric columns
    #[arg(long, default_value = "5", value_parser = validate_neighbors)]
    pub neighbors: usize,

    /// How neighbour values are combined: "distance" (inverse-distance
    /// weighted, default) or "uniform" (plain mean)
    #[arg(long, default_value = "distance")]
    pub weighting: Weighting,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean the data, compare five regressors, tune a random forest and save it
    Train {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        clean: CleanArgs,

        /// Fraction of rows held out for evaluation (0 < x < 1)
        #[arg(long, default_value = "0.2", value_parser = validate_test_size)]
        test_size: f64,

        /// Seed for the split, bootstraps, initialisation and search sampling
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Length of each feature ranking
        #[arg(long, default_value = "10")]
        top_k: usize,

        /// Parameter combinations sampled by the randomized search
        #[arg(long, default_value = "10")]
        search_iterations: usize,

        /// Cross-validation folds per search trial
        #[arg(long, default_value = "3", value_parser = validate_cv_folds)]
        cv_folds: usize,

        /// Categorical columns with more distinct values are left out of the features
        #[arg(long, default_value = "100")]
        max_categories: usize,

        /// Where to save the tuned model
        #[arg(short, long, default_value = "random_forest_best_model.json")]
        model: PathBuf,

        /// Also write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Score this file with the tuned model after training
        #[arg(long)]
        unseen: Option<PathBuf>,

        /// Minimum share of training columns an unseen file must contain (0-1)
        #[arg(long, default_value = "0.5", value_parser = validate_fraction)]
        min_column_overlap: f64,

        /// Tune on standardised features; the scaler is saved with the model
        #[arg(long, default_value = "false")]
        tune_on_scaled: bool,

        /// Median/IQR-scale numeric features before min-max and standard scaling
        #[arg(long, default_value = "false")]
        robust_scale: bool,

        /// Skip the exploratory tables
        #[arg(long, default_value = "false")]
        skip_explore: bool,

        /// Skip interactive confirmation prompts
        #[arg(long, default_value = "false")]
        no_confirm: bool,
    },

    /// Clean the data and print the exploratory tables
    Explore {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        clean: CleanArgs,
    },

    /// Score a CSV or Parquet file with a saved model
    Score {
        #[command(flatten)]
        data: DataArgs,

        /// Saved model artifact
        #[arg(short, long, default_value = "random_forest_best_model.json")]
        model: PathBuf,

        /// Predictions file (CSV or Parquet by extension).
        /// Defaults to the input directory with a '_predictions.csv' suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minimum share of training columns the file must contain (0-1)
        #[arg(long, default_value = "0.5", value_parser = validate_fraction)]
        min_column_overlap: f64,

        /// Skip interactive confirmation prompts
        #[arg(long, default_value = "false")]
        no_confirm: bool,
    },
}

/// Predictions path next to the input: `data.csv` → `data_predictions.csv`
pub fn predictions_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}_predictions.csv", stem))
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for test_size: strictly between 0 and 1
fn validate_test_size(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("test_size must be between 0 and 1 (exclusive), got {}", value))
    }
}

/// Validator for fractions in [0, 1]
fn validate_fraction(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    }
}

fn validate_neighbors(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("neighbors must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid count", s)),
    }
}

fn validate_cv_folds(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 2 => Ok(n),
        Ok(n) => Err(format!("cv_folds must be at least 2, got {}", n)),
        Err(_) => Err(format!("'{}' is not a valid count", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators() {
        assert!(validate_test_size("0.2").is_ok());
        assert!(validate_test_size("1.0").is_err());
        assert!(validate_fraction("1.0").is_ok());
        assert!(validate_fraction("-0.1").is_err());
        assert!(validate_cv_folds("1").is_err());
        assert!(validate_neighbors("0").is_err());
        assert!(validate_neighbors("abc").is_err());
    }

    #[test]
    fn test_predictions_path_sits_next_to_input() {
        let path = predictions_path(Path::new("/data/new_movies.parquet"));
        assert_eq!(path, PathBuf::from("/data/new_movies_predictions.csv"));
    }
}
