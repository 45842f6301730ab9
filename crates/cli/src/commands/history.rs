//! Prediction log inspection

use anyhow::Result;
use forecast_lib::store::read_records;
use forecast_lib::PredictionRecord;
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_temperature, format_timestamp, print_json, print_table, OutputFormat};

/// Row for the prediction history table
#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "City")]
    city: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Predicted")]
    predicted: String,
}

/// Most recent `limit` records, newest first, optionally for one city
fn select(
    records: Vec<PredictionRecord>,
    city: Option<&str>,
    limit: usize,
) -> Vec<PredictionRecord> {
    let city = city.map(|c| c.trim().to_lowercase());
    let mut selected: Vec<PredictionRecord> = records
        .into_iter()
        .filter(|r| city.as_ref().map_or(true, |c| r.city.to_lowercase() == *c))
        .collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    selected.truncate(limit);
    selected
}

/// Show recent entries from the prediction log
pub fn show_history(
    log: &Path,
    city: Option<&str>,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let records = select(read_records(log)?, city, limit);

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<HistoryRow> = records
                .iter()
                .map(|r| HistoryRow {
                    timestamp: format_timestamp(&r.timestamp),
                    city: r.city.clone(),
                    model: r.model_used.clone(),
                    observed: format_temperature(r.temperature),
                    predicted: format_temperature(r.prediction),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
