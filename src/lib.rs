//! Box-office: Gross Revenue Prediction Library
//!
//! Cleans movie metadata, ranks features, compares regression models,
//! tunes a random forest and scores unseen films with the saved model.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
