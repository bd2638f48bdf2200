#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crash risk engine.
//!
//! Trains the hotspot and risk models from a CSV export of crash records,
//! and answers hotspot and point-risk predictions against the persisted
//! models. Results are printed as JSON.

mod csv_source;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use crash_risk_analytics::features::parse_timestamp;
use crash_risk_analytics::{AnalyticsConfig, CrashRiskEngine, TimeRange};
use crash_risk_analytics_models::RiskQuery;
use serde::Serialize;

use crate::csv_source::CsvCrashSource;

/// Train and query crash hotspot and risk models.
#[derive(Parser)]
#[command(name = "crash_risk")]
#[command(about = "Train and query crash hotspot and risk models")]
struct Cli {
    /// Optional TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted model bundles.
    #[arg(
        long,
        global = true,
        env = "CRASH_RISK_MODEL_DIR",
        default_value = "data/models"
    )]
    model_dir: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Cluster historical crashes into hotspots and persist the model.
    TrainHotspots {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Forecast active hotspots for a time window.
    PredictHotspots {
        /// Window start (defaults to now).
        #[arg(long)]
        at: Option<String>,

        /// Window length in hours.
        #[arg(long, default_value_t = 24)]
        window_hours: u32,

        /// Only report hotspots scoring above this.
        #[arg(long, default_value_t = 5.0)]
        min_crashes: f64,
    },

    /// Train the severity classifier and regressor and persist them.
    TrainRisk {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Estimate crash risk at a location.
    PredictRisk {
        /// Latitude (WGS84).
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude (WGS84).
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Weather code or name (defaults to clear).
        #[arg(long)]
        weather: Option<String>,

        /// Road-condition code or name (defaults to dry).
        #[arg(long)]
        road_condition: Option<String>,

        /// Timestamp (defaults to now).
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Check that a persisted risk model can be loaded.
    LoadRisk,
}

/// Where to read training records from.
#[derive(clap::Args)]
struct DataArgs {
    /// CSV file of crash records.
    #[arg(long)]
    data: PathBuf,

    /// Only use crashes at or after this time.
    #[arg(long)]
    since: Option<String>,

    /// Only use crashes before this time.
    #[arg(long)]
    until: Option<String>,
}

impl DataArgs {
    fn time_range(&self) -> Result<Option<TimeRange>, Box<dyn std::error::Error>> {
        if self.since.is_none() && self.until.is_none() {
            return Ok(None);
        }
        let parse = |raw: Option<&String>| raw.map(|s| parse_timestamp(s)).transpose();
        Ok(Some(TimeRange::new(
            parse(self.since.as_ref())?,
            parse(self.until.as_ref())?,
        )))
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AnalyticsConfig::from_file(path)?,
        None => AnalyticsConfig::default(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    log::debug!("Model directory: {}", cli.model_dir.display());
    let engine = CrashRiskEngine::with_model_dir(&config, &cli.model_dir);

    match cli.command {
        Commands::TrainHotspots { data } => {
            let source = CsvCrashSource::new(&data.data, config.location);
            let report = engine.train_hotspots_from(&source, data.time_range()?.as_ref())?;
            print_json(&report)?;
        }
        Commands::PredictHotspots {
            at,
            window_hours,
            min_crashes,
        } => {
            let at = at.as_deref().map(parse_timestamp).transpose()?.unwrap_or_else(now);
            let predictions = engine.predict_hotspots(at, window_hours, min_crashes)?;
            if predictions.is_empty() {
                log::info!("No hotspots above {min_crashes} for {at} + {window_hours}h");
            }
            print_json(&predictions)?;
        }
        Commands::TrainRisk { data } => {
            let source = CsvCrashSource::new(&data.data, config.location);
            let metrics = engine.train_risk_from(&source, data.time_range()?.as_ref())?;
            print_json(&metrics)?;
        }
        Commands::PredictRisk {
            lat,
            lon,
            weather,
            road_condition,
            timestamp,
        } => {
            let query = RiskQuery {
                latitude: lat,
                longitude: lon,
                weather,
                road_condition,
                timestamp,
            };
            print_json(&engine.predict_risk(&query)?)?;
        }
        Commands::LoadRisk => {
            let loaded = engine.load_risk_model()?;
            if !loaded {
                log::warn!(
                    "No usable risk model in {}; run train-risk first",
                    cli.model_dir.display()
                );
            }
            print_json(&serde_json::json!({ "loaded": loaded }))?;
        }
    }

    Ok(())
}
