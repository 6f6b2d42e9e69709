//! Console helpers shared by the binary and the pipeline stages

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
