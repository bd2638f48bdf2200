//! CSV-backed crash source.
//!
//! Expects a header row with the columns
//! `id,timestamp,hour_of_day,weather,road_condition,fatal_count,injury_count,longitude,latitude`
//! and an optional `estimated_location` column. Empty cells are allowed for
//! everything except `id` and `timestamp`.

use std::path::{Path, PathBuf};

use chrono::Timelike;
use crash_risk_analytics::features::parse_timestamp;
use crash_risk_analytics::{CrashSource, SourceError, TimeRange};
use crash_risk_crash_models::{CrashRecord, LocationBounds, normalize_hour};
use serde::Deserialize;

/// One CSV row before normalization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    timestamp: String,
    #[serde(default)]
    hour_of_day: Option<i64>,
    #[serde(default)]
    weather: Option<String>,
    #[serde(default)]
    road_condition: Option<String>,
    #[serde(default)]
    fatal_count: Option<u32>,
    #[serde(default)]
    injury_count: Option<u32>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    estimated_location: Option<bool>,
}

impl CsvRow {
    fn into_record(self, bounds: &LocationBounds) -> Result<CrashRecord, String> {
        let timestamp = parse_timestamp(&self.timestamp).map_err(|e| e.to_string())?;

        #[allow(clippy::cast_possible_truncation)]
        let hour_of_day = self
            .hour_of_day
            .map_or(timestamp.hour() as u8, normalize_hour);

        let location = bounds.resolve(self.latitude, self.longitude);

        Ok(CrashRecord {
            id: self.id,
            timestamp,
            hour_of_day,
            weather: self.weather.unwrap_or_default(),
            road_condition: self.road_condition.unwrap_or_default(),
            fatal_count: self.fatal_count.unwrap_or(0),
            injury_count: self.injury_count.unwrap_or(0),
            longitude: location.longitude,
            latitude: location.latitude,
            estimated_location: location.estimated || self.estimated_location.unwrap_or(false),
        })
    }
}

/// Reads crash records from a CSV file on every fetch.
#[derive(Debug, Clone)]
pub struct CsvCrashSource {
    path: PathBuf,
    bounds: LocationBounds,
}

impl CsvCrashSource {
    /// Creates a source over `path`, resolving coordinates with `bounds`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, bounds: LocationBounds) -> Self {
        Self {
            path: path.into(),
            bounds,
        }
    }

    /// The CSV file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CrashSource for CsvCrashSource {
    fn fetch_crashes(&self, range: Option<&TimeRange>) -> Result<Vec<CrashRecord>, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| SourceError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut records = Vec::new();
        let mut skipped = 0u64;
        let mut estimated = 0u64;
        let mut first_error = None;

        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = index as u64 + 1;
            let record = result
                .map_err(|e| e.to_string())
                .and_then(|r| r.into_record(&self.bounds));
            let record = match record {
                Ok(record) => record,
                Err(message) => {
                    log::debug!("Skipping row {row}: {message}");
                    skipped += 1;
                    first_error.get_or_insert((row, message));
                    continue;
                }
            };

            if range.is_some_and(|r| !r.contains(record.timestamp)) {
                continue;
            }
            if record.estimated_location {
                estimated += 1;
            }
            records.push(record);
        }

        if records.is_empty()
            && let Some((row, message)) = first_error
        {
            return Err(SourceError::Malformed { row, message });
        }
        if skipped > 0 {
            log::warn!(
                "Skipped {skipped} malformed rows in {}",
                self.path.display()
            );
        }

        log::info!(
            "Loaded {} crashes from {} ({estimated} with estimated locations)",
            records.len(),
            self.path.display()
        );

        Ok(records)
    }
}
