//! Error types for the modelling pipeline.
//!
//! Each variant names the stage-boundary check that failed so the CLI can
//! report it without a backtrace.

use thiserror::Error;

/// Errors raised by pipeline stages when their input does not satisfy the
/// shape or schema they require.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more required columns are absent from the table.
    #[error("Missing required column(s) {missing:?}. Available columns: {available:?}")]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// The table has no rows.
    #[error("Table is empty: {stage} requires at least one row")]
    EmptyTable { stage: &'static str },

    /// A column contains no observed value at all.
    #[error("Column '{column}' has no observed values and cannot be imputed")]
    AllMissing { column: String },

    /// A column that must be numeric holds another type.
    #[error("Column '{column}' must be numeric, found {dtype}")]
    NonNumericFeature { column: String, dtype: String },

    /// A feature column still contains nulls when a dense matrix is built.
    #[error("Column '{column}' contains {count} null value(s) after cleaning")]
    NullsInFeature { column: String, count: usize },

    /// Two inputs that must agree in length do not.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A label encoder was asked to transform a value it never saw.
    #[error("Column '{column}' contains unseen category '{value}'")]
    UnseenCategory { column: String, value: String },

    /// The scored table shares too few columns with the training schema.
    #[error(
        "Schema mismatch: only {matched} of {expected} training column(s) present \
         ({ratio:.1}% < required {required:.1}%)"
    )]
    SchemaMismatch {
        matched: usize,
        expected: usize,
        ratio: f64,
        required: f64,
    },

    /// A model was used for prediction before being fit.
    #[error("Model '{model}' has not been fit")]
    NotFitted { model: String },

    /// A hyperparameter is outside its valid range.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
