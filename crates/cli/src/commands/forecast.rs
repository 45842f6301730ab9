//! Commands that query a running forecaster

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ComparisonEntry};
use crate::output::{
    color_delta, color_status, format_condition, format_temperature, format_timestamp,
    print_info, print_json, print_table, OutputFormat,
};

/// Row for the model comparison table
#[derive(Tabled)]
struct ComparisonRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Next Hour")]
    prediction: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Row for the model list table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Checksum")]
    checksum: String,
    #[tabled(rename = "Path")]
    path: String,
}

/// Predict the next-hour temperature for a city with one model
pub async fn predict(
    client: &ApiClient,
    city: &str,
    model: &str,
    format: OutputFormat,
) -> Result<()> {
    let result = client.predict(city, model).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let obs = &result.observation;
            println!("{}", format!("Forecast for {}", obs.city).bold());
            println!("{}", "=".repeat(50));
            println!("Model:                  {}", result.model_name.cyan());
            println!("Observed at:            {}", format_timestamp(&obs.observed_at));
            println!();

            println!("{}", "Current Conditions".bold());
            println!("{}", "-".repeat(50));
            println!("Temperature:            {}", format_temperature(obs.temperature));
            println!("Humidity:               {:.0}%", obs.humidity);
            println!("Pressure:               {:.1} hPa", obs.pressure);
            println!("Wind:                   {:.1} m/s", obs.wind_speed);
            println!("Condition:              {}", format_condition(obs.condition_code));
            println!();

            println!(
                "{} {} ({})",
                "Next hour:".bold(),
                format_temperature(result.predicted_temperature).green().bold(),
                color_delta(obs.temperature, result.predicted_temperature)
            );
        }
    }

    Ok(())
}

/// Run every model on one observation and show the results side by side
pub async fn compare(client: &ApiClient, city: &str, format: OutputFormat) -> Result<()> {
    let comparison = client.compare(city).await?;

    match format {
        OutputFormat::Json => print_json(&comparison)?,
        OutputFormat::Table => {
            let obs = &comparison.observation;
            println!(
                "{} {} at {}, {}",
                "Current:".bold(),
                obs.city.cyan(),
                format_temperature(obs.temperature),
                format_condition(obs.condition_code)
            );

            let rows: Vec<ComparisonRow> = comparison
                .predictions
                .iter()
                .map(|(name, entry)| match entry {
                    ComparisonEntry::Prediction(p) => ComparisonRow {
                        model: name.clone(),
                        prediction: format_temperature(p.predicted_temperature),
                        change: color_delta(obs.temperature, p.predicted_temperature),
                        error: "-".to_string(),
                    },
                    ComparisonEntry::Failure(e) => ComparisonRow {
                        model: name.clone(),
                        prediction: "-".to_string(),
                        change: "-".to_string(),
                        error: e.message.red().to_string(),
                    },
                })
                .collect();

            print_table(&rows);
        }
    }

    Ok(())
}

/// List configured models and whether their artifacts loaded
pub async fn list_models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.models().await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_info(&format!("Weather provider: {}", response.provider));

            let rows: Vec<ModelRow> = response
                .models
                .into_iter()
                .map(|m| ModelRow {
                    name: m.name,
                    status: color_status(if m.loaded { "loaded" } else { "not loaded" }),
                    family: m.family.unwrap_or_else(|| "-".to_string()),
                    checksum: m
                        .checksum
                        .map(|c| c.chars().take(12).collect())
                        .unwrap_or_else(|| "-".to_string()),
                    path: m.path,
                })
                .collect();

            print_table(&rows);
        }
    }

    Ok(())
}
