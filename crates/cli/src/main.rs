//! Weather Forecaster CLI
//!
//! A command-line tool for requesting next-hour temperature forecasts,
//! comparing models, and running the offline training pipeline.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{forecast, history, training};
use forecast_lib::training::{HistoryRequest, DEFAULT_SEED, DEFAULT_TEST_RATIO, OPEN_METEO_URL};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "Linear Regression";

/// Weather Forecaster CLI
#[derive(Parser)]
#[command(name = "wxf")]
#[command(author, version, about = "CLI for the Weather Forecaster", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via WXF_API_URL env var)
    #[arg(long, env = "WXF_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the next-hour temperature for a city
    Predict {
        /// City name
        city: String,

        /// Model to use (defaults to the configured model, then Linear Regression)
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Compare every model's prediction for a city
    Compare {
        /// City name
        city: String,
    },

    /// List the models the server knows about
    Models,

    /// Download hourly history from Open-Meteo for training
    FetchHistory {
        /// Latitude of the location
        #[arg(long, default_value_t = 13.0827, allow_hyphen_values = true)]
        latitude: f64,

        /// Longitude of the location
        #[arg(long, default_value_t = 80.2707, allow_hyphen_values = true)]
        longitude: f64,

        /// Days of past data (at most 92)
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Output file path
        #[arg(long, short, default_value = "weather_data.json")]
        output: PathBuf,

        /// Open-Meteo base URL
        #[arg(long, default_value = OPEN_METEO_URL, hide = true)]
        base_url: String,
    },

    /// Train every model family and write their artifacts
    Train {
        /// Hourly dataset produced by fetch-history
        #[arg(long, short, default_value = "weather_data.json")]
        dataset: PathBuf,

        /// Directory for model artifacts
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Seed for the train/test split and random forest
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Fraction of samples held out for evaluation
        #[arg(long, default_value_t = DEFAULT_TEST_RATIO)]
        test_ratio: f64,
    },

    /// Show recent entries from the prediction log
    History {
        /// Prediction log database
        #[arg(long)]
        log: Option<PathBuf>,

        /// Only show predictions for this city
        #[arg(long, short)]
        city: Option<String>,

        /// Maximum number of entries
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load()?;

    match cli.command {
        Commands::Predict { city, model } => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            let model = model
                .or(config.default_model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            forecast::predict(&client, &city, &model, cli.format).await?;
        }
        Commands::Compare { city } => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            forecast::compare(&client, &city, cli.format).await?;
        }
        Commands::Models => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url))?;
            forecast::list_models(&client, cli.format).await?;
        }
        Commands::FetchHistory {
            latitude,
            longitude,
            days,
            output,
            base_url,
        } => {
            let request = HistoryRequest {
                latitude,
                longitude,
                past_days: days,
                base_url,
            };
            training::fetch(request, &output, cli.format).await?;
        }
        Commands::Train {
            dataset,
            model_dir,
            seed,
            test_ratio,
        } => {
            let model_dir = model_dir
                .or(config.model_dir)
                .unwrap_or_else(|| PathBuf::from("models"));
            training::train(&dataset, model_dir, seed, test_ratio, cli.format)?;
        }
        Commands::History { log, city, limit } => {
            let log = log
                .or(config.prediction_log)
                .unwrap_or_else(|| PathBuf::from("predictions.db"));
            history::show_history(&log, city.as_deref(), limit, cli.format)?;
        }
    }

    Ok(())
}
