//! Model comparison summary

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::metrics::RegressionMetrics;
use crate::pipeline::train::{StageTiming, TrainingOutcome};
use crate::utils::styling::format_duration;

/// One row of the comparison table
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub name: String,
    pub metrics: RegressionMetrics,
    pub fit_seconds: f64,
}

/// Held-out metrics of every model plus the tuned forest
#[derive(Debug, Default)]
pub struct TrainingSummary {
    pub rows: Vec<SummaryRow>,
    pub tuned: Option<SummaryRow>,
    pub timings: Vec<StageTiming>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
}

impl TrainingSummary {
    pub fn from_outcome(outcome: &TrainingOutcome) -> Self {
        Self {
            rows: outcome
                .evaluations
                .iter()
                .map(|e| SummaryRow {
                    name: e.name.clone(),
                    metrics: e.metrics,
                    fit_seconds: e.fit_seconds,
                })
                .collect(),
            tuned: Some(SummaryRow {
                name: "Random Forest (tuned)".to_string(),
                metrics: outcome.tuning.test_metrics,
                fit_seconds: outcome
                    .timings
                    .iter()
                    .find(|t| t.stage == "tune")
                    .map_or(0.0, |t| t.seconds),
            }),
            timings: outcome.timings.clone(),
            n_train: outcome.n_train,
            n_test: outcome.n_test,
            n_features: outcome.feature_names.len(),
        }
    }

    /// Index of the row with the highest R² among the compared models
    pub fn best_index(&self) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.metrics
                    .r2
                    .partial_cmp(&b.metrics.r2)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    pub fn metrics_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Model").add_attribute(Attribute::Bold),
            Cell::new("MAE").add_attribute(Attribute::Bold),
            Cell::new("MSE").add_attribute(Attribute::Bold),
            Cell::new("RMSE").add_attribute(Attribute::Bold),
            Cell::new("R²").add_attribute(Attribute::Bold),
            Cell::new("Fit").add_attribute(Attribute::Bold),
        ]);

        let best = self.best_index();
        for (i, row) in self.rows.iter().enumerate() {
            let is_best = Some(i) == best;
            let name = if is_best {
                format!("🏆 {}", row.name)
            } else {
                row.name.clone()
            };
            let r2_color = if is_best {
                Color::Green
            } else if row.metrics.r2 < 0.0 {
                Color::Red
            } else {
                Color::White
            };
            let mut name_cell = Cell::new(name);
            if is_best {
                name_cell = name_cell.add_attribute(Attribute::Bold);
            }
            table.add_row(vec![
                name_cell,
                Cell::new(format!("{:.4e}", row.metrics.mae)),
                Cell::new(format!("{:.4e}", row.metrics.mse)),
                Cell::new(format!("{:.4e}", row.metrics.rmse)),
                Cell::new(format!("{:.4}", row.metrics.r2)).fg(r2_color),
                Cell::new(format!("{:.2}s", row.fit_seconds)),
            ]);
        }

        if let Some(tuned) = &self.tuned {
            table.add_row(vec![
                Cell::new(&tuned.name).fg(Color::Cyan),
                Cell::new(format!("{:.4e}", tuned.metrics.mae)),
                Cell::new(format!("{:.4e}", tuned.metrics.mse)),
                Cell::new(format!("{:.4e}", tuned.metrics.rmse)),
                Cell::new(format!("{:.4}", tuned.metrics.r2)).fg(Color::Cyan),
                Cell::new(format!("{:.2}s", tuned.fit_seconds)),
            ]);
        }
        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("MODEL COMPARISON").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!(
            "      {} train rows · {} test rows · {} features",
            style(self.n_train).yellow(),
            style(self.n_test).yellow(),
            style(self.n_features).yellow()
        );
        println!();

        // Indent the table
        for line in self.metrics_table().to_string().lines() {
            println!("    {}", line);
        }

        if !self.timings.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("⏱").cyan(),
                style("STAGE TIMINGS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for timing in &self.timings {
                println!(
                    "      {} {:<12} {}",
                    style("•").dim(),
                    timing.stage,
                    style(format_duration(std::time::Duration::from_secs_f64(
                        timing.seconds
                    )))
                    .dim()
                );
            }
        }
    }
}
