//! Console tables for exploration, cleaning, rankings and reconciliation

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::explore::ExplorationReport;
use crate::pipeline::features::Reconciliation;
use crate::pipeline::impute::CleaningReport;
use crate::pipeline::outliers::OutlierCount;
use crate::pipeline::select::{FeatureScore, SelectionReport};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

/// Print a titled, indented table
pub fn print_table(title: &str, table: &Table) {
    println!();
    println!("      {}", style(title).cyan().bold());
    for line in table.to_string().lines() {
        println!("      {}", line);
    }
}

/// Large values in a compact scientific form, small ones as plain decimals
fn fmt_value(v: f64) -> String {
    if v.abs() >= 1e6 {
        format!("{:.3e}", v)
    } else {
        format!("{:.2}", v)
    }
}

/// `describe()`-style statistics of the numeric columns
pub fn describe_table(report: &ExplorationReport) -> Table {
    let mut table = new_table(&["Column", "Count", "Mean", "Std", "Min", "Median", "Max"]);
    for s in &report.summaries {
        table.add_row(vec![
            Cell::new(&s.column),
            Cell::new(s.count),
            Cell::new(fmt_value(s.mean)),
            Cell::new(fmt_value(s.std)),
            Cell::new(fmt_value(s.min)),
            Cell::new(fmt_value(s.median)),
            Cell::new(fmt_value(s.max)),
        ]);
    }
    table
}

/// Null counts per column, only columns with at least one null
pub fn missing_table(counts: &[(String, usize)], rows: usize) -> Table {
    let mut table = new_table(&["Column", "Missing", "Share"]);
    for (column, n) in counts.iter().filter(|(_, n)| *n > 0) {
        let share = if rows > 0 { *n as f64 / rows as f64 } else { 0.0 };
        table.add_row(vec![
            Cell::new(column),
            Cell::new(n).fg(Color::Yellow),
            Cell::new(format!("{:.1}%", share * 100.0)),
        ]);
    }
    table
}

/// Print every exploratory view of the report
pub fn print_exploration(report: &ExplorationReport) {
    print_table("Numeric summary", &describe_table(report));

    for view in &report.grouped {
        let header = format!("{} of {}", view.aggregation, view.value);
        let mut table = new_table(&[view.by.as_str(), header.as_str()]);
        for (key, value) in &view.rows {
            table.add_row(vec![Cell::new(key), Cell::new(fmt_value(*value))]);
        }
        print_table(&format!("{} by {}", view.value, view.by), &table);
    }

    for (column, counts) in &report.counts {
        let mut table = new_table(&[column.as_str(), "Movies"]);
        for (key, n) in counts {
            table.add_row(vec![Cell::new(key), Cell::new(n)]);
        }
        print_table(&format!("Movies by {}", column), &table);
    }
}

/// Cells filled per column during cleaning
pub fn cleaning_table(report: &CleaningReport) -> Table {
    let mut table = new_table(&["Column", "Method", "Filled"]);
    for (column, n) in report.knn_filled.iter().filter(|(_, n)| *n > 0) {
        table.add_row(vec![Cell::new(column), Cell::new("k-NN"), Cell::new(n)]);
    }
    for (column, n, value) in report.categorical_filled.iter().filter(|(_, n, _)| *n > 0) {
        table.add_row(vec![
            Cell::new(column),
            Cell::new(format!("constant '{}'", value)),
            Cell::new(n),
        ]);
    }
    for (column, n, value) in &report.remaining.filled {
        table.add_row(vec![
            Cell::new(column),
            Cell::new(format!("median/mode '{}'", value)),
            Cell::new(n),
        ]);
    }
    table
}

/// IQR bounds and outlier counts
pub fn outlier_table(counts: &[OutlierCount]) -> Table {
    let mut table = new_table(&["Column", "Lower", "Upper", "Outliers"]);
    for count in counts {
        let (lower, upper) = count
            .bounds
            .as_ref()
            .map_or(("-".to_string(), "-".to_string()), |b| {
                (fmt_value(b.lower), fmt_value(b.upper))
            });
        table.add_row(vec![
            Cell::new(&count.column),
            Cell::new(lower),
            Cell::new(upper),
            Cell::new(count.outliers).fg(if count.outliers > 0 {
                Color::Yellow
            } else {
                Color::White
            }),
        ]);
    }
    table
}

fn ranking_rows(table: &mut Table, label: &str, scores: &[FeatureScore]) {
    for (rank, s) in scores.iter().enumerate() {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(rank + 1),
            Cell::new(&s.name),
            Cell::new(fmt_value(s.score)),
        ]);
    }
}

/// Both feature rankings in one table
pub fn selection_table(report: &SelectionReport) -> Table {
    let mut table = new_table(&["Ranking", "#", "Feature", "Score"]);
    ranking_rows(&mut table, "F statistic", &report.univariate);
    ranking_rows(&mut table, "Importance", &report.importance);
    table
}

/// What scoring had to change to match the training columns
pub fn reconciliation_table(report: &Reconciliation) -> Table {
    let mut table = new_table(&["Check", "Value"]);
    table.add_row(vec![
        Cell::new("Training columns present"),
        Cell::new(format!(
            "{} / {} ({:.1}%)",
            report.matched,
            report.expected,
            report.overlap() * 100.0
        )),
    ]);
    table.add_row(vec![
        Cell::new("Zero-filled columns"),
        Cell::new(report.zero_filled.len()).fg(if report.zero_filled.is_empty() {
            Color::Green
        } else {
            Color::Yellow
        }),
    ]);
    table.add_row(vec![
        Cell::new("Dropped extra columns"),
        Cell::new(report.dropped.len()),
    ]);
    table
}
