//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or `value` as JSON
pub fn print_rows<T: Tabled, S: Serialize + ?Sized>(
    rows: Vec<T>,
    value: &S,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability or ratio as a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Color a positive-class probability: likely auto thefts in red
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_percent(confidence);
    if confidence >= 0.5 {
        formatted.red().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Color a metric where higher is better
pub fn color_score(score: f64) -> String {
    let formatted = format_percent(score);
    if score >= 0.8 {
        formatted.green().to_string()
    } else if score >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "loaded" | "healthy" | "running" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "missing" | "invalid" | "unhealthy" | "error" => status.red().to_string(),
        _ => status.to_string(),
    }
}
