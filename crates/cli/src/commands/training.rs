//! Offline commands: dataset download and model training

use anyhow::{Context, Result};
use colored::Colorize;
use forecast_lib::training::{fetch_history, HistoryRequest};
use forecast_lib::{TrainingConfig, TrainingPipeline};
use std::path::{Path, PathBuf};
use tabled::Tabled;

use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};

/// Row for the training results table
#[derive(Tabled)]
struct EvaluationRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "MSE")]
    mse: String,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "Artifact")]
    artifact: String,
}

/// Download hourly history from Open-Meteo into a dataset file
pub async fn fetch(request: HistoryRequest, output: &Path, format: OutputFormat) -> Result<()> {
    let rows = fetch_history(&request, output).await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "output": output,
            "rows": rows,
            "latitude": request.latitude,
            "longitude": request.longitude,
            "past_days": request.past_days,
        }))?,
        OutputFormat::Table => print_success(&format!(
            "Saved {} hourly rows to {}",
            rows,
            output.display()
        )),
    }

    Ok(())
}

/// Train every model family on a dataset and write their artifacts
pub fn train(
    dataset: &Path,
    model_dir: PathBuf,
    seed: u64,
    test_ratio: f64,
    format: OutputFormat,
) -> Result<()> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        anyhow::bail!("--test-ratio must be between 0 and 1 (exclusive), got {}", test_ratio);
    }

    let pipeline = TrainingPipeline::new(TrainingConfig {
        model_dir,
        seed,
        test_ratio,
        ..Default::default()
    });

    let report = pipeline
        .train(dataset)
        .with_context(|| format!("Training on {} failed", dataset.display()))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!(
                "{} {} samples ({} train / {} test), seed {}",
                "Dataset:".bold(),
                report.samples,
                report.train_samples,
                report.test_samples,
                seed
            );

            let rows: Vec<EvaluationRow> = report
                .results
                .iter()
                .map(|(name, result)| match result {
                    Ok(eval) => EvaluationRow {
                        model: name.clone(),
                        mse: format!("{:.4}", eval.mse),
                        r2: format!("{:.4}", eval.r2),
                        artifact: eval.artifact_path.clone().unwrap_or_else(|| "-".to_string()),
                    },
                    Err(e) => EvaluationRow {
                        model: name.clone(),
                        mse: "-".to_string(),
                        r2: "-".to_string(),
                        artifact: e.red().to_string(),
                    },
                })
                .collect();
            print_table(&rows);

            if let Some(best) = report.best() {
                print_success(&format!("Lowest test MSE: {} ({:.4})", best.model_name, best.mse));
            }
            if report.failed() > 0 {
                print_warning(&format!("{} model(s) failed to train", report.failed()));
            }
        }
    }

    if report.failed() == report.results.len() {
        anyhow::bail!("No model was trained");
    }

    Ok(())
}
