//! Integration tests for the cleaning stage

use boxoffice::pipeline::impute::{clean_dataset, KnnImputer, Weighting, UNKNOWN};
use boxoffice::pipeline::schema::{column_f64, column_strings};
use boxoffice::pipeline::MovieSchema;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_single_missing_value_lands_in_observed_range() {
    let df = df! {
        "budget" => [Some(10.0f64), Some(12.0), Some(30.0), None, Some(11.0), Some(50.0)],
        "duration" => [100.0f64, 104.0, 150.0, 103.0, 102.0, 170.0],
        "gross" => [20.0f64, 24.0, 70.0, 22.0, 21.0, 110.0],
    }
    .unwrap();

    for weighting in [Weighting::Uniform, Weighting::Distance] {
        let imputer = KnnImputer::new(3, weighting);
        let names = vec!["budget".to_string(), "duration".to_string(), "gross".to_string()];
        let (out, filled) = imputer.fit_transform(&df, &names).unwrap();

        let budget = column_f64(&out, "budget").unwrap();
        let value = budget[3].expect("imputed value");
        assert!(
            (10.0..=50.0).contains(&value),
            "{} imputation left the observed range: {}",
            weighting,
            value
        );
        // The three closest rows all have budgets between 10 and 12
        assert!(value <= 12.0);
        assert_eq!(filled.iter().find(|(c, _)| c == "budget").unwrap().1, 1);
    }
}

#[test]
fn test_clean_dataset_leaves_no_nulls() {
    let df = create_movie_dataframe(120, 7);
    let null_cells: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    assert!(null_cells > 0, "fixture should contain missing cells");

    let schema = MovieSchema::default();
    let (cleaned, report) = clean_dataset(&df, &schema, &KnnImputer::default()).unwrap();

    assert_no_nulls(&cleaned);
    assert_eq!(cleaned.height(), df.height());
    assert_eq!(report.total_filled(), null_cells);
}

#[test]
fn test_unknown_fill_for_names() {
    let df = create_movie_dataframe(80, 11);
    let missing_directors = df.column("director_name").unwrap().null_count();

    let schema = MovieSchema::default();
    let (cleaned, _) = clean_dataset(&df, &schema, &KnnImputer::default()).unwrap();
    let directors = column_strings(&cleaned, "director_name").unwrap();
    let unknown = directors
        .iter()
        .filter(|d| d.as_deref() == Some(UNKNOWN))
        .count();
    assert_eq!(unknown, missing_directors);
}

#[test]
fn test_missing_required_column_is_reported() {
    let df = create_movie_dataframe(20, 3).drop("budget").unwrap();
    let err = clean_dataset(&df, &MovieSchema::default(), &KnnImputer::default()).unwrap_err();
    assert!(err.to_string().contains("budget"));
}
