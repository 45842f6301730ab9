//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use forecast_lib::condition::ConditionGroup;
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

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Temperature rounded to two decimals for display
pub fn format_temperature(celsius: f64) -> String {
    format!("{:.2} °C", celsius)
}

/// Signed change between two temperatures
pub fn format_delta(from: f64, to: f64) -> String {
    format!("{:+.2}", to - from)
}

/// Condition code with its description, e.g. `Rain (500)`
pub fn format_condition(code: i32) -> String {
    format!("{} ({})", ConditionGroup::from_code(code).description(), code)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Color a warming change red and a cooling change blue
pub fn color_delta(from: f64, to: f64) -> String {
    let formatted = format_delta(from, to);
    if to - from > 0.0 {
        formatted.red().to_string()
    } else if to - from < 0.0 {
        formatted.blue().to_string()
    } else {
        formatted
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "loaded" | "ok" | "healthy" => status.green().to_string(),
        "not loaded" | "degraded" => status.yellow().to_string(),
        "failed" | "unhealthy" | "error" => status.red().to_string(),
        _ => status.to_string(),
    }
}
