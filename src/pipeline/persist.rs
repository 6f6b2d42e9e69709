//! Model artifact persistence

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::encode::{MultiLabelEncoder, OneHotEncoder};
use super::impute::TrainingFills;
use super::models::{ForestParams, RandomForestRegressor};
use super::scale::AffineScaler;

/// Bumped whenever the artifact layout changes incompatibly
pub const FORMAT_VERSION: u32 = 2;

/// Everything needed to score new rows exactly as the model was trained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub crate_version: String,
    pub created_at: String,
    pub target: String,
    /// Feature columns in the order the model expects
    pub training_columns: Vec<String>,
    /// Medians and modes of the cleaned training rows, used for nulls in
    /// scored tables
    pub fills: TrainingFills,
    pub multi_label: MultiLabelEncoder,
    pub encoder: OneHotEncoder,
    /// Fitted scaling chain applied to the reconciled features before
    /// prediction; absent when the model was tuned on unscaled features
    pub scaler: Option<AffineScaler>,
    pub best_params: ForestParams,
    /// Mean cross-validated negative MSE of `best_params`
    pub cv_score: f64,
    pub model: RandomForestRegressor,
}

impl ModelArtifact {
    pub fn new(
        target: &str,
        training_columns: Vec<String>,
        encoder: OneHotEncoder,
        scaler: Option<AffineScaler>,
        best_params: ForestParams,
        cv_score: f64,
        model: RandomForestRegressor,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now().to_rfc3339(),
            target: target.to_string(),
            training_columns,
            fills: TrainingFills::default(),
            multi_label: MultiLabelEncoder::default(),
            encoder,
            scaler,
            best_params,
            cv_score,
            model,
        }
    }

    pub fn with_fills(mut self, fills: TrainingFills) -> Self {
        self.fills = fills;
        self
    }

    pub fn with_multi_label(mut self, multi_label: MultiLabelEncoder) -> Self {
        self.multi_label = multi_label;
        self
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize model artifact")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model artifact to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse model artifact {}", path.display()))?;
        if artifact.format_version != FORMAT_VERSION {
            bail!(
                "Model artifact {} has format version {}, expected {}",
                path.display(),
                artifact.format_version,
                FORMAT_VERSION
            );
        }
        if artifact.model.n_features() != artifact.training_columns.len() {
            bail!(
                "Model artifact {} is inconsistent: the forest expects {} features but {} training columns are listed",
                path.display(),
                artifact.model.n_features(),
                artifact.training_columns.len()
            );
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::Regressor;
    use faer::Mat;
    use tempfile::TempDir;

    fn artifact() -> ModelArtifact {
        let x = Mat::from_fn(12, 2, |i, j| (i * (j + 1)) as f64);
        let y: Vec<f64> = (0..12).map(|i| i as f64 * 2.0).collect();
        let params = ForestParams {
            n_estimators: 3,
            ..Default::default()
        };
        let mut model = RandomForestRegressor::new(params);
        model.fit(&x, &y).unwrap();
        ModelArtifact::new(
            "gross",
            vec!["a".to_string(), "b".to_string()],
            OneHotEncoder {
                drop_first: true,
                columns: Vec::new(),
            },
            None,
            params,
            -1.5,
            model,
        )
        .with_fills(TrainingFills {
            numeric: vec![("a".to_string(), 5.5), ("b".to_string(), 11.0)],
            categorical: Vec::new(),
        })
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let original = artifact();
        original.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        let x = Mat::from_fn(4, 2, |i, j| (i + j) as f64);
        assert_eq!(
            original.model.predict(&x).unwrap(),
            loaded.model.predict(&x).unwrap()
        );
        assert_eq!(loaded.training_columns, original.training_columns);
        assert_eq!(loaded.format_version, FORMAT_VERSION);
        assert_eq!(loaded.fills, original.fills);
    }

    #[test]
    fn test_load_rejects_column_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let mut broken = artifact();
        broken.training_columns.push("c".to_string());
        broken.save(&path).unwrap();
        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn test_load_reports_path_on_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
    }
}
