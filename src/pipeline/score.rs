//! Scoring unseen tables with a saved artifact

use std::path::Path;

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;

use super::features::{reconcile_columns, FeatureMatrix, Reconciliation};
use super::loader::FileFormat;
use super::models::Regressor;
use super::persist::ModelArtifact;
use super::scale::FeatureScaler;
use super::schema::{categorical_columns, column_names};

/// Predictions for every input row plus what reconciliation changed
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub predictions: Vec<f64>,
    pub reconciliation: Reconciliation,
    /// (column, cells) filled with the stored training medians and modes
    pub filled: Vec<(String, usize)>,
}

/// A scored table turned into model input
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub data: Mat<f64>,
    pub reconciliation: Reconciliation,
    pub filled: Vec<(String, usize)>,
}

/// Turn a raw table into the feature matrix the artifact's model expects.
///
/// Nulls are filled with the training medians and modes stored in the
/// artifact, delimited and one-hot columns that are present go through the
/// stored encoders, remaining text columns and the target are dropped, and
/// the result is reconciled against the training columns before the stored
/// scaler (if any) is applied.
pub fn prepare_unseen(
    df: &DataFrame,
    artifact: &ModelArtifact,
    min_overlap: f64,
) -> Result<PreparedInput> {
    let (filled_frame, filled) = artifact.fills.apply(df)?;
    let expanded = artifact.multi_label.transform_available(&filled_frame)?;
    let encoded = artifact.encoder.transform_available(&expanded)?;

    let mut to_drop = categorical_columns(&encoded);
    if column_names(&encoded).contains(&artifact.target) {
        to_drop.push(artifact.target.clone());
    }
    let numeric = encoded.drop_many(&to_drop);

    let (aligned, reconciliation) =
        reconcile_columns(&numeric, &artifact.training_columns, min_overlap)?;
    let matrix = FeatureMatrix::from_frame(&aligned, &[])?;

    let data = match &artifact.scaler {
        Some(scaler) => scaler.transform(&matrix.data)?,
        None => matrix.data,
    };
    Ok(PreparedInput {
        data,
        reconciliation,
        filled,
    })
}

/// Predict every row of `df`
pub fn score_frame(
    df: &DataFrame,
    artifact: &ModelArtifact,
    min_overlap: f64,
) -> Result<ScoringOutcome> {
    let input = prepare_unseen(df, artifact, min_overlap)?;
    let predictions = artifact.model.predict(&input.data)?;
    Ok(ScoringOutcome {
        predictions,
        reconciliation: input.reconciliation,
        filled: input.filled,
    })
}

/// Write predictions as a single `prediction` column (CSV or Parquet by
/// extension)
pub fn write_predictions(path: &Path, predictions: &[f64]) -> Result<()> {
    let mut df = DataFrame::new(vec![Column::new(
        "prediction".into(),
        predictions.to_vec(),
    )])?;

    match FileFormat::from_path(path)? {
        FileFormat::Csv => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(&mut df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        FileFormat::Parquet => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(&mut df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::OneHotEncoder;
    use crate::pipeline::impute::TrainingFills;
    use crate::pipeline::models::{ForestParams, RandomForestRegressor};
    use tempfile::TempDir;

    fn artifact() -> ModelArtifact {
        let train = df! {
            "budget" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
            "color" => ["Color", "Black", "Color", "Black", "Color", "Color"],
        }
        .unwrap();
        let encoder = OneHotEncoder::fit(&train, &["color".to_string()], true).unwrap();
        let encoded = encoder.transform(&train).unwrap();
        let matrix = FeatureMatrix::from_frame(&encoded, &[]).unwrap();
        let y = vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let params = ForestParams {
            n_estimators: 4,
            ..Default::default()
        };
        let mut model = RandomForestRegressor::new(params);
        model.fit(&matrix.data, &y).unwrap();
        let fills = TrainingFills::fit(&train, &[]).unwrap();
        ModelArtifact::new("gross", matrix.names, encoder, None, params, -1.0, model)
            .with_fills(fills)
    }

    #[test]
    fn test_scores_partial_table() {
        let unseen = df! {
            "budget" => [Some(2.5f64), None],
            "gross" => [1.0f64, 2.0],
            "extra" => ["x", "y"],
        }
        .unwrap();
        let outcome = score_frame(&unseen, &artifact(), 0.5).unwrap();
        assert_eq!(outcome.predictions.len(), 2);
        assert_eq!(outcome.reconciliation.zero_filled, vec!["color_Color".to_string()]);
        assert_eq!(outcome.filled, vec![("budget".to_string(), 1)]);
    }

    #[test]
    fn test_unrelated_table_rejected() {
        let unseen = df! { "runtime" => [90.0f64, 120.0] }.unwrap();
        assert!(score_frame(&unseen, &artifact(), 0.5).is_err());
    }

    #[test]
    fn test_write_predictions_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preds.csv");
        write_predictions(&path, &[1.5, 2.5]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("prediction"));
        assert_eq!(text.lines().count(), 3);
    }
}
