//! CLI module - argument parsing and interactive prompts

mod args;
mod prompts;

pub use args::{predictions_path, CleanArgs, Cli, Commands, DataArgs};
pub use prompts::*;
