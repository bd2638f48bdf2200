//! Feature engineering: crash records and query points to numeric vectors.

use std::f64::consts::TAU;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use crash_risk_analytics_models::FeatureVector;
use crash_risk_crash_models::{CrashRecord, road_risk, weather_risk};

use crate::AnalyticsError;

/// Timestamp layouts accepted in queries, tried in order.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// The raw attributes a feature vector is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInput<'a> {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Month (1-12).
    pub month: u32,
    /// Saturday or Sunday.
    pub is_weekend: bool,
    /// Raw weather code.
    pub weather: &'a str,
    /// Raw road-condition code.
    pub road_condition: &'a str,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
}

impl<'a> FeatureInput<'a> {
    /// Input for a point at a moment in time; hour, month and weekday come
    /// from `timestamp`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn at(
        timestamp: NaiveDateTime,
        weather: &'a str,
        road_condition: &'a str,
        longitude: f64,
        latitude: f64,
    ) -> Self {
        Self {
            hour: timestamp.hour() as u8,
            month: timestamp.month(),
            is_weekend: matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun),
            weather,
            road_condition,
            longitude,
            latitude,
        }
    }
}

impl<'a> From<&'a CrashRecord> for FeatureInput<'a> {
    fn from(record: &'a CrashRecord) -> Self {
        Self {
            hour: record.hour_of_day,
            month: record.month(),
            is_weekend: record.is_weekend(),
            weather: &record.weather,
            road_condition: &record.road_condition,
            longitude: record.longitude,
            latitude: record.latitude,
        }
    }
}

/// Computes the feature vector for one record or query point.
///
/// Unrecognized weather/road codes score the lowest risk ordinal.
#[must_use]
pub fn engineer(input: &FeatureInput<'_>) -> FeatureVector {
    let hour_angle = TAU * f64::from(input.hour) / 24.0;
    let month_angle = TAU * f64::from(input.month) / 12.0;

    FeatureVector {
        hour_sin: hour_angle.sin(),
        hour_cos: hour_angle.cos(),
        month_sin: month_angle.sin(),
        month_cos: month_angle.cos(),
        is_weekend: if input.is_weekend { 1.0 } else { 0.0 },
        weather_risk: f64::from(weather_risk(input.weather)),
        road_risk: f64::from(road_risk(input.road_condition)),
        longitude: input.longitude,
        latitude: input.latitude,
    }
}

/// Parses a query timestamp.
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.f]]` or the same with a space instead of
/// the `T`, and a bare `YYYY-MM-DD` (midnight). An RFC 3339 timestamp with
/// an offset (`Z`, `+02:00`) keeps its wall-clock time at that offset; the
/// offset itself is dropped, not converted to UTC or local time.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidInput`] for anything else.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AnalyticsError> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| AnalyticsError::InvalidInput {
            message: format!("unrecognized timestamp '{raw}'"),
        })
}
