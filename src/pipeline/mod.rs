//! Pipeline module - every stage from raw movie table to saved model

pub mod encode;
pub mod error;
pub mod explore;
pub mod features;
pub mod impute;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod outliers;
pub mod persist;
pub mod scale;
pub mod schema;
pub mod score;
pub mod select;
pub mod split;
pub mod train;
pub mod tune;

pub use encode::{LabelEncoder, OneHotEncoder};
pub use error::PipelineError;
pub use explore::{explore_movies, ExplorationReport};
pub use impute::{clean_dataset, CleaningReport, KnnImputer, Weighting};
pub use loader::*;
pub use metrics::{evaluate, ModelEvaluation, RegressionMetrics};
pub use models::{ModelKind, Regressor};
pub use persist::ModelArtifact;
pub use schema::MovieSchema;
pub use score::{score_frame, write_predictions, ScoringOutcome};
pub use select::SelectionReport;
pub use train::{run_training, TrainConfig, TrainingOutcome};
pub use tune::{ForestParamGrid, SearchConfig};
