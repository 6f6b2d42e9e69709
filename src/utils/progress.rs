//! Spinners and progress bars (indicatif)

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

/// Spinner for a stage of unknown length (cleaning, ranking, model fits)
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("    {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Bar counting finished search trials. Hidden bars still count, so callers
/// can drive them unconditionally.
pub fn create_trial_bar(trials: u64, folds: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::with_draw_target(Some(trials), ProgressDrawTarget::hidden());
    }
    let pb = ProgressBar::new(trials);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("    {msg} [{bar:30.cyan/blue}] {pos}/{len} trials ({eta})")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_message(format!("Search, {}-fold CV", folds));
    pb.enable_steady_tick(TICK);
    pb
}

/// Replace a spinner with a success line
pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.set_style(ProgressStyle::with_template("    {msg}").unwrap());
    pb.finish_with_message(format!("✓ {}", message));
}
