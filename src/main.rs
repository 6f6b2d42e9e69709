//! Box-office: Gross Revenue Prediction CLI
//!
//! Trains and compares regressors on movie metadata, tunes a random forest,
//! saves it and scores unseen films.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;

use boxoffice::cli::{confirm_overwrite, predictions_path, CleanArgs, Cli, Commands, DataArgs};
use boxoffice::pipeline::explore::missing_counts;
use boxoffice::pipeline::{
    clean_dataset, explore_movies, get_column_names, load_dataset, run_training, score_frame,
    write_predictions, DatasetStats, KnnImputer, ModelArtifact, MovieSchema, ScoringOutcome,
    SearchConfig, TrainConfig,
};
use boxoffice::report::{
    cleaning_table, export_run_report, missing_table, outlier_table, print_exploration,
    print_table, reconciliation_table, selection_table, ReportParams, TrainingSummary,
};
use boxoffice::utils::{
    create_spinner, finish_with_success, format_duration, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success, print_warning,
    ConfigCard,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            clean,
            test_size,
            seed,
            top_k,
            search_iterations,
            cv_folds,
            max_categories,
            model,
            report,
            unseen,
            min_column_overlap,
            tune_on_scaled,
            robust_scale,
            skip_explore,
            no_confirm,
        } => {
            let config = TrainConfig {
                test_size,
                seed,
                n_neighbors: clean.neighbors,
                weighting: clean.weighting,
                top_k,
                max_categories,
                search: SearchConfig {
                    n_iter: search_iterations,
                    cv: cv_folds,
                    seed,
                    show_progress: true,
                },
                tune_on_scaled,
                robust_scale,
                explore: !skip_explore,
                verbose: true,
                first_step: 2,
                ..Default::default()
            };
            let options = TrainOptions {
                model_path: model,
                report_path: report,
                unseen,
                min_column_overlap,
                no_confirm,
            };
            run_train(&data, &clean, &config, &options)
        }
        Commands::Explore { data, clean } => run_explore(&data, &clean),
        Commands::Score {
            data,
            model,
            output,
            min_column_overlap,
            no_confirm,
        } => {
            let output = output.unwrap_or_else(|| predictions_path(&data.input));
            run_score(&data, &model, &output, min_column_overlap, no_confirm)
        }
    }
}

/// Output-side options of the `train` subcommand
struct TrainOptions {
    model_path: PathBuf,
    report_path: Option<PathBuf>,
    unseen: Option<PathBuf>,
    min_column_overlap: f64,
    no_confirm: bool,
}

fn schema_for(clean: &CleanArgs) -> MovieSchema {
    MovieSchema {
        target: clean.target.clone(),
        ..Default::default()
    }
}

/// Fail before loading rows when the target column is absent
fn check_target(data: &DataArgs, target: &str) -> Result<()> {
    let columns = get_column_names(&data.input)?;
    if !columns.iter().any(|c| c == target) {
        anyhow::bail!(
            "Target column '{}' not found in dataset. Available columns: {:?}",
            target,
            columns
        );
    }
    Ok(())
}

/// Step 1 of every subcommand: load the table and print its statistics
fn load_step(data: &DataArgs) -> Result<polars::prelude::DataFrame> {
    print_step_header(1, "Loading Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading dataset...");
    let df = load_dataset(&data.input, data.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let stats = DatasetStats::from_frame(&df);
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", stats.rows);
    println!("      Columns: {}", stats.columns);
    println!("      Missing cells: {}", stats.null_cells);
    println!("      Estimated memory: {:.2} MB", stats.memory_mb);
    print_step_time(step_start.elapsed());
    Ok(df)
}

fn run_train(
    data: &DataArgs,
    clean: &CleanArgs,
    config: &TrainConfig,
    options: &TrainOptions,
) -> Result<()> {
    let run_start = Instant::now();
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&ConfigCard {
        input: &data.input,
        target: &clean.target,
        output: Some(&options.model_path),
        test_size: config.test_size,
        seed: config.seed,
    });

    let schema = schema_for(clean);
    check_target(data, &clean.target)?;
    let df = load_step(data)?;
    schema.validate(&df)?;
    if config.explore {
        print_table("Missing values", &missing_table(&missing_counts(&df), df.height()));
    }

    let outcome = run_training(&df, &schema, config)?;

    print_table("Cells filled during cleaning", &cleaning_table(&outcome.cleaning));
    if let Some(exploration) = &outcome.exploration {
        print_exploration(exploration);
    }
    print_table("IQR outlier diagnostics", &outlier_table(&outcome.outliers));
    print_table("Feature rankings", &selection_table(&outcome.selection));

    TrainingSummary::from_outcome(&outcome).display();
    if !outcome.tuning.on_scaled_features {
        print_warning(
            "The comparison used standardised features but the search ran on unscaled ones; \
             pass --tune-on-scaled to tune on the same features",
        );
    }

    println!();
    if confirm_overwrite(&options.model_path, options.no_confirm)? {
        outcome.artifact.save(&options.model_path)?;
        print_success(&format!("Model saved to {}", options.model_path.display()));
    } else {
        print_info("Model not saved");
    }

    if let Some(report_path) = &options.report_path {
        let input = data.input.display().to_string();
        let model = options.model_path.display().to_string();
        let params = ReportParams {
            input_file: &input,
            target_column: &clean.target,
            model_file: &model,
            seed: config.seed,
            test_size: config.test_size,
            n_neighbors: config.n_neighbors,
        };
        export_run_report(report_path, &outcome, &params)?;
        print_success(&format!("Run report written to {}", report_path.display()));
    }

    if let Some(unseen) = &options.unseen {
        print_info(&format!("Scoring {}", unseen.display()));
        let df = load_dataset(unseen, data.infer_schema_length)?;
        let scored = score_frame(&df, &outcome.artifact, options.min_column_overlap)?;
        report_scoring(&scored);
        let output = predictions_path(unseen);
        if confirm_overwrite(&output, options.no_confirm)? {
            write_predictions(&output, &scored.predictions)?;
            print_success(&format!("Predictions written to {}", output.display()));
        }
    }

    print_completion(&format!(
        "Training complete in {}",
        format_duration(run_start.elapsed())
    ));
    Ok(())
}

fn run_explore(data: &DataArgs, clean: &CleanArgs) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));
    let schema = schema_for(clean);
    check_target(data, &clean.target)?;
    let df = load_step(data)?;
    print_table("Missing values", &missing_table(&missing_counts(&df), df.height()));

    print_step_header(2, "Cleaning");
    let step_start = Instant::now();
    let spinner = create_spinner("Imputing missing values...");
    let imputer = KnnImputer::new(clean.neighbors, clean.weighting);
    let (cleaned, report) = clean_dataset(&df, &schema, &imputer)?;
    finish_with_success(&spinner, "Cleaning complete");
    print_count("missing cells filled", report.total_filled(), None);
    print_table("Cells filled during cleaning", &cleaning_table(&report));
    print_step_time(step_start.elapsed());

    print_step_header(3, "Exploration");
    let step_start = Instant::now();
    let exploration = explore_movies(&cleaned, &schema)?;
    print_exploration(&exploration);
    print_step_time(step_start.elapsed());

    print_completion("Exploration complete");
    Ok(())
}

fn run_score(
    data: &DataArgs,
    model_path: &Path,
    output: &Path,
    min_column_overlap: f64,
    no_confirm: bool,
) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));
    let artifact = ModelArtifact::load(model_path)?;
    print_info(&format!(
        "Loaded model for '{}' ({} features, CV neg-MSE {:.4e})",
        artifact.target,
        artifact.training_columns.len(),
        artifact.cv_score
    ));

    let df = load_step(data)?;

    print_step_header(2, "Scoring");
    let step_start = Instant::now();
    let scored = score_frame(&df, &artifact, min_column_overlap)?;
    report_scoring(&scored);
    print_step_time(step_start.elapsed());

    if !confirm_overwrite(output, no_confirm)? {
        print_info("Predictions not written");
        return Ok(());
    }
    write_predictions(output, &scored.predictions)?;
    print_completion(&format!("Predictions written to {}", output.display()));
    Ok(())
}

fn report_scoring(scored: &ScoringOutcome) {
    let filled: usize = scored.filled.iter().map(|(_, n)| n).sum();
    if filled > 0 {
        print_count(
            "missing cells filled",
            filled,
            Some(&format!("(training medians/modes, {} columns)", scored.filled.len())),
        );
    }
    print_table("Column reconciliation", &reconciliation_table(&scored.reconciliation));
    if !scored.reconciliation.zero_filled.is_empty() {
        print_warning(&format!(
            "{} training column(s) absent and filled with 0: {}",
            scored.reconciliation.zero_filled.len(),
            scored.reconciliation.zero_filled.join(", ")
        ));
    }
    print_count("rows scored", scored.predictions.len(), None);
}
