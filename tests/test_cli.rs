//! Tests for CLI argument parsing and the binary's subcommands

use assert_cmd::Command;
use boxoffice::cli::{Cli, Commands};
use boxoffice::pipeline::Weighting;
use clap::Parser;
use predicates::prelude::*;
use std::path::PathBuf;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_train_default_values() {
    let cli = Cli::parse_from(["boxoffice", "train", "-i", "movie_metadata.csv"]);

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
            min_column_overlap,
            tune_on_scaled,
            no_confirm,
            ..
        } => {
            assert_eq!(data.input, PathBuf::from("movie_metadata.csv"));
            assert_eq!(data.infer_schema_length, 10000);
            assert_eq!(clean.target, "gross");
            assert_eq!(clean.neighbors, 5);
            assert_eq!(clean.weighting, Weighting::Distance);
            assert_eq!(test_size, 0.2);
            assert_eq!(seed, 42);
            assert_eq!(top_k, 10);
            assert_eq!(search_iterations, 10);
            assert_eq!(cv_folds, 3);
            assert_eq!(max_categories, 100);
            assert_eq!(model, PathBuf::from("random_forest_best_model.json"));
            assert_eq!(min_column_overlap, 0.5);
            assert!(!tune_on_scaled, "Default tune_on_scaled should be false");
            assert!(!no_confirm, "Default no_confirm should be false");
        }
        other => panic!("expected train, got {:?}", other),
    }
}

#[test]
fn test_custom_weighting_and_target() {
    let cli = Cli::parse_from([
        "boxoffice",
        "explore",
        "-i",
        "data.parquet",
        "-t",
        "worldwide_gross",
        "--weighting",
        "uniform",
        "--neighbors",
        "3",
    ]);

    match cli.command {
        Commands::Explore { clean, .. } => {
            assert_eq!(clean.target, "worldwide_gross");
            assert_eq!(clean.weighting, Weighting::Uniform);
            assert_eq!(clean.neighbors, 3);
        }
        other => panic!("expected explore, got {:?}", other),
    }
}

#[test]
fn test_out_of_range_fractions_rejected() {
    for args in [
        ["boxoffice", "train", "-i", "d.csv", "--test-size", "1.5"],
        ["boxoffice", "train", "-i", "d.csv", "--test-size", "0"],
        ["boxoffice", "train", "-i", "d.csv", "--min-column-overlap", "2"],
        ["boxoffice", "train", "-i", "d.csv", "--cv-folds", "1"],
        ["boxoffice", "train", "-i", "d.csv", "--weighting", "cosine"],
    ] {
        assert!(Cli::try_parse_from(args).is_err(), "accepted {:?}", args);
    }
}

#[test]
fn test_subcommand_required() {
    assert!(Cli::try_parse_from(["boxoffice"]).is_err());
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("boxoffice")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("explore"))
        .stdout(predicate::str::contains("score"));
}

#[test]
fn test_score_with_missing_model_fails() {
    let mut df = create_movie_dataframe(10, 1);
    let (dir, csv_path) = create_temp_csv(&mut df);
    let model_path = dir.path().join("absent_model.json");

    Command::cargo_bin("boxoffice")
        .unwrap()
        .args(["score", "--no-confirm", "-i"])
        .arg(&csv_path)
        .arg("-m")
        .arg(&model_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent_model.json"));
}

#[test]
fn test_explore_runs_on_csv() {
    let mut df = create_movie_dataframe(60, 2);
    let (_dir, csv_path) = create_temp_csv(&mut df);

    Command::cargo_bin("boxoffice")
        .unwrap()
        .args(["explore", "-i"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exploration complete"));
}

#[test]
fn test_train_then_score() {
    let mut df = create_movie_dataframe(100, 4);
    let (dir, csv_path) = create_temp_csv(&mut df);
    let model_path = dir.path().join("model.json");
    let report_path = dir.path().join("report.json");

    Command::cargo_bin("boxoffice")
        .unwrap()
        .args([
            "train",
            "--no-confirm",
            "--skip-explore",
            "--search-iterations",
            "1",
            "-i",
        ])
        .arg(&csv_path)
        .arg("-m")
        .arg(&model_path)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Training complete"));

    assert!(model_path.exists());
    assert!(report_path.exists());

    let output = dir.path().join("scored.csv");
    Command::cargo_bin("boxoffice")
        .unwrap()
        .args(["score", "--no-confirm", "-i"])
        .arg(&csv_path)
        .arg("-m")
        .arg(&model_path)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let scored = boxoffice::pipeline::load_dataset(&output, 100).unwrap();
    assert_eq!(scored.height(), 100);
}
