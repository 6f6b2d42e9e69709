//! Integration tests for saving a model and scoring unseen tables

use boxoffice::pipeline::loader::load_dataset;
use boxoffice::pipeline::models::ModelKind;
use boxoffice::pipeline::*;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn train_small(tune_on_scaled: bool) -> TrainingOutcome {
    let df = create_movie_dataframe(100, 13);
    let config = TrainConfig {
        models: vec![ModelKind::LinearRegression],
        grid: ForestParamGrid {
            n_estimators: vec![8],
            max_depth: vec![Some(5)],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        },
        search: SearchConfig {
            n_iter: 1,
            ..Default::default()
        },
        tune_on_scaled,
        ..Default::default()
    };
    run_training(&df, &MovieSchema::default(), &config).unwrap()
}

#[test]
fn test_saved_model_scores_unseen_csv() {
    let outcome = train_small(false);
    let dir = tempfile::TempDir::new().unwrap();
    let model_path = dir.path().join("random_forest_best_model.json");
    outcome.artifact.save(&model_path).unwrap();

    let artifact = ModelArtifact::load(&model_path).unwrap();
    assert_eq!(artifact.training_columns, outcome.feature_names);

    // Unseen films arrive without a gross column
    let mut unseen = create_movie_dataframe(15, 99).drop("gross").unwrap();
    let (_csv_dir, csv_path) = create_temp_csv(&mut unseen);
    let unseen = load_dataset(&csv_path, 100).unwrap();

    let scored = score_frame(&unseen, &artifact, 0.5).unwrap();
    assert_eq!(scored.predictions.len(), 15);
    assert!(scored.predictions.iter().all(|p| p.is_finite()));

    let out_path = dir.path().join("predictions.csv");
    write_predictions(&out_path, &scored.predictions).unwrap();
    let written = load_dataset(&out_path, 100).unwrap();
    assert_eq!(written.height(), 15);
    assert_has_columns(&written, &["prediction"]);
}

#[test]
fn test_missing_categorical_column_is_zero_filled() {
    let outcome = train_small(false);
    let unseen = create_movie_dataframe(10, 5).drop("country").unwrap();

    let scored = score_frame(&unseen, &outcome.artifact, 0.5).unwrap();
    assert_eq!(scored.predictions.len(), 10);
    assert!(!scored.reconciliation.zero_filled.is_empty());
    assert!(scored
        .reconciliation
        .zero_filled
        .iter()
        .all(|c| c.starts_with("country_")));
}

#[test]
fn test_scaled_artifact_round_trips() {
    let outcome = train_small(true);
    assert!(outcome.artifact.scaler.is_some());

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    outcome.artifact.save(&path).unwrap();
    let loaded = ModelArtifact::load(&path).unwrap();

    let unseen = create_movie_dataframe(12, 77);
    let before = score_frame(&unseen, &outcome.artifact, 0.5).unwrap();
    let after = score_frame(&unseen, &loaded, 0.5).unwrap();
    assert_eq!(before.predictions, after.predictions);
}

#[test]
fn test_unrelated_table_is_rejected() {
    let outcome = train_small(false);
    let df = df! {
        "sensor_a" => [1.0f64, 2.0],
        "sensor_b" => [3.0f64, 4.0],
    }
    .unwrap();
    let err = score_frame(&df, &outcome.artifact, 0.5).unwrap_err();
    assert!(err.to_string().contains("Schema mismatch"));
}

#[test]
fn test_null_budget_is_filled_from_training_median() {
    let outcome = train_small(false);
    let artifact = &outcome.artifact;
    let budget_median = artifact
        .fills
        .numeric
        .iter()
        .find(|(c, _)| c == "budget")
        .map(|(_, v)| *v)
        .unwrap();

    let mut unknown = create_movie_dataframe(1, 8).drop("gross").unwrap();
    unknown
        .with_column(Column::new("budget".into(), [None::<f64>]))
        .unwrap();
    let mut known = unknown.clone();
    known
        .with_column(Column::new("budget".into(), [budget_median]))
        .unwrap();

    // Through CSV the all-null budget column is read back as text
    let (_dir, csv_path) = create_temp_csv(&mut unknown);
    let unknown = load_dataset(&csv_path, 100).unwrap();

    let scored = score_frame(&unknown, artifact, 0.5).unwrap();
    assert!(!scored.reconciliation.zero_filled.contains(&"budget".to_string()));
    assert!(scored.filled.contains(&("budget".to_string(), 1)));

    let expected = score_frame(&known, artifact, 0.5).unwrap();
    assert_eq!(scored.predictions, expected.predictions);
}

#[test]
fn test_genre_tokens_reach_the_model() {
    let outcome = train_small(false);
    assert!(outcome
        .artifact
        .training_columns
        .contains(&"genres_Thriller".to_string()));

    let unseen = create_movie_dataframe(6, 31).drop("genres").unwrap();
    let scored = score_frame(&unseen, &outcome.artifact, 0.5).unwrap();
    assert!(scored
        .reconciliation
        .zero_filled
        .iter()
        .all(|c| c.starts_with("genres_")));
}
