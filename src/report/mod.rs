//! Report module - console tables and the JSON run report

pub mod run_report;
pub mod summary;
pub mod tables;

pub use run_report::*;
pub use summary::*;
pub use tables::*;
