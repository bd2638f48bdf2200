#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash record types and condition code tables.
//!
//! A [`CrashRecord`] is the unit every analytical component consumes. The
//! weather and road-condition code tables defined here are the single
//! source of truth for the ordinal risk values used by feature
//! engineering; unrecognized codes always resolve to [`LOWEST_RISK`].

use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Ordinal assigned to any weather or road code that is not in the tables.
pub const LOWEST_RISK: u8 = 1;

/// Weather condition reported for a crash.
///
/// Parses from either the numeric source code (`"1"`-`"7"`) or the
/// lowercase name, case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum WeatherCondition {
    /// Code 1
    #[strum(to_string = "clear", serialize = "1")]
    Clear,
    /// Code 2
    #[strum(to_string = "cloudy", serialize = "2")]
    Cloudy,
    /// Code 3
    #[strum(to_string = "rain", serialize = "3")]
    Rain,
    /// Code 4
    #[strum(to_string = "snow", serialize = "4")]
    Snow,
    /// Code 5
    #[strum(
        to_string = "sleet_hail",
        serialize = "5",
        serialize = "sleet/hail",
        serialize = "sleet",
        serialize = "hail"
    )]
    SleetHail,
    /// Code 6
    #[strum(to_string = "fog", serialize = "6")]
    Fog,
    /// Code 7
    #[strum(to_string = "other", serialize = "7")]
    Other,
}

impl WeatherCondition {
    /// Returns the ordinal risk value for this condition.
    #[must_use]
    pub const fn risk(self) -> u8 {
        match self {
            Self::Clear => 1,
            Self::Cloudy | Self::Other => 2,
            Self::Rain | Self::Fog => 3,
            Self::Snow | Self::SleetHail => 4,
        }
    }

    /// Parses a raw source code, returning `None` for anything unrecognized.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        code.trim().parse().ok()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Clear,
            Self::Cloudy,
            Self::Rain,
            Self::Snow,
            Self::SleetHail,
            Self::Fog,
            Self::Other,
        ]
    }
}

/// Road surface condition reported for a crash.
///
/// Parses from either the numeric source code (`"1"`-`"5"`) or the
/// lowercase name, case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum RoadCondition {
    /// Code 1
    #[strum(to_string = "dry", serialize = "1")]
    Dry,
    /// Code 2
    #[strum(to_string = "wet", serialize = "2")]
    Wet,
    /// Code 3
    #[strum(
        to_string = "snow_slush",
        serialize = "3",
        serialize = "snow/slush",
        serialize = "snow",
        serialize = "slush"
    )]
    SnowSlush,
    /// Code 4
    #[strum(to_string = "ice", serialize = "4")]
    Ice,
    /// Code 5
    #[strum(to_string = "other", serialize = "5")]
    Other,
}

impl RoadCondition {
    /// Returns the ordinal risk value for this condition.
    #[must_use]
    pub const fn risk(self) -> u8 {
        match self {
            Self::Dry => 1,
            Self::Other => 2,
            Self::Wet => 3,
            Self::SnowSlush | Self::Ice => 4,
        }
    }

    /// Parses a raw source code, returning `None` for anything unrecognized.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        code.trim().parse().ok()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Dry,
            Self::Wet,
            Self::SnowSlush,
            Self::Ice,
            Self::Other,
        ]
    }
}

/// Ordinal weather risk for a raw code, defaulting to [`LOWEST_RISK`].
#[must_use]
pub fn weather_risk(code: &str) -> u8 {
    WeatherCondition::from_code(code).map_or(LOWEST_RISK, WeatherCondition::risk)
}

/// Ordinal road risk for a raw code, defaulting to [`LOWEST_RISK`].
#[must_use]
pub fn road_risk(code: &str) -> u8 {
    RoadCondition::from_code(code).map_or(LOWEST_RISK, RoadCondition::risk)
}

/// Coarse time-of-day bucket used to summarize when crashes happen.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeOfDay {
    /// 06:00-09:59
    Morning,
    /// 10:00-13:59
    Midday,
    /// 14:00-17:59
    Afternoon,
    /// 18:00-21:59
    Evening,
    /// 22:00-05:59
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of day (0-23).
    #[must_use]
    pub const fn from_hour(hour: u8) -> Self {
        match hour {
            6..=9 => Self::Morning,
            10..=13 => Self::Midday,
            14..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }
}

/// Normalizes a raw hour value into `0..=23`.
///
/// `24` is midnight, larger values wrap, negative values become `0`.
#[must_use]
pub fn normalize_hour(raw: i64) -> u8 {
    match raw {
        0..=23 => u8::try_from(raw).unwrap_or(0),
        24 => 0,
        h if h > 24 => u8::try_from(h % 24).unwrap_or(0),
        _ => 0,
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns `true` if the point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

/// Coordinates after sanity checking, with a flag when they were guessed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// `true` when the source coordinates were missing or implausible and
    /// the fallback point was used instead.
    pub estimated: bool,
}

/// Sanity box for source coordinates plus the point substituted when a
/// record's coordinates fall outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationBounds {
    /// Coordinates outside this box are treated as unusable.
    pub bbox: BoundingBox,
    /// Fallback latitude.
    pub fallback_latitude: f64,
    /// Fallback longitude.
    pub fallback_longitude: f64,
}

impl Default for LocationBounds {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::new(-81.0, 39.0, -74.0, 43.0),
            fallback_latitude: 40.9147,
            fallback_longitude: -77.8476,
        }
    }
}

impl LocationBounds {
    /// Resolves raw source coordinates, substituting the fallback point
    /// (and flagging it) when either value is missing, non-finite, or
    /// outside the sanity box.
    #[must_use]
    pub fn resolve(&self, latitude: Option<f64>, longitude: Option<f64>) -> ResolvedLocation {
        match (latitude, longitude) {
            (Some(lat), Some(lon))
                if lat.is_finite() && lon.is_finite() && self.bbox.contains(lon, lat) =>
            {
                ResolvedLocation {
                    latitude: lat,
                    longitude: lon,
                    estimated: false,
                }
            }
            _ => ResolvedLocation {
                latitude: self.fallback_latitude,
                longitude: self.fallback_longitude,
                estimated: true,
            },
        }
    }
}

/// A geocoded crash as supplied by the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    /// Source identifier (crash reference number).
    pub id: String,
    /// When the crash occurred.
    pub timestamp: NaiveDateTime,
    /// Hour of day, always in `0..=23`.
    pub hour_of_day: u8,
    /// Raw weather code.
    pub weather: String,
    /// Raw road-condition code.
    pub road_condition: String,
    /// Number of fatalities.
    pub fatal_count: u32,
    /// Number of injuries.
    pub injury_count: u32,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Whether the coordinates are a fallback rather than the reported
    /// location.
    #[serde(default)]
    pub estimated_location: bool,
}

impl CrashRecord {
    /// Weighted harm score: `3 * fatalities + injuries`.
    #[must_use]
    pub const fn severity_score(&self) -> u32 {
        self.fatal_count * 3 + self.injury_count
    }

    /// `true` if anyone was killed or injured.
    #[must_use]
    pub const fn is_severe(&self) -> bool {
        self.fatal_count > 0 || self.injury_count > 0
    }

    /// Month of the crash (1-12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    /// `true` if the crash happened on a Saturday or Sunday.
    #[must_use]
    pub fn is_weekend(&self) -> bool {
        matches!(self.timestamp.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Time-of-day bucket for this crash.
    #[must_use]
    pub const fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_hour(self.hour_of_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_named_codes_agree() {
        assert_eq!(WeatherCondition::from_code("3"), Some(WeatherCondition::Rain));
        assert_eq!(WeatherCondition::from_code("Rain"), Some(WeatherCondition::Rain));
        assert_eq!(
            WeatherCondition::from_code("sleet/hail"),
            Some(WeatherCondition::SleetHail)
        );
        assert_eq!(RoadCondition::from_code("4"), Some(RoadCondition::Ice));
        assert_eq!(RoadCondition::from_code(" SLUSH "), Some(RoadCondition::SnowSlush));
    }

    #[test]
    fn risk_tables_match_ordinals() {
        let weather: Vec<u8> = WeatherCondition::all().iter().map(|w| w.risk()).collect();
        assert_eq!(weather, vec![1, 2, 3, 4, 4, 3, 2]);

        let road: Vec<u8> = RoadCondition::all().iter().map(|r| r.risk()).collect();
        assert_eq!(road, vec![1, 3, 4, 4, 2]);
    }

    #[test]
    fn unknown_codes_default_to_lowest_risk() {
        for code in ["", "0", "8", "99", "tornado", "unknown"] {
            assert_eq!(weather_risk(code), LOWEST_RISK, "weather code {code:?}");
        }
        for code in ["", "0", "6", "9", "gravel"] {
            assert_eq!(road_risk(code), LOWEST_RISK, "road code {code:?}");
        }
    }

    #[test]
    fn display_uses_names() {
        assert_eq!(WeatherCondition::SleetHail.to_string(), "sleet_hail");
        assert_eq!(RoadCondition::Wet.to_string(), "wet");
    }

    #[test]
    fn hours_normalize_into_range() {
        assert_eq!(normalize_hour(0), 0);
        assert_eq!(normalize_hour(23), 23);
        assert_eq!(normalize_hour(24), 0);
        assert_eq!(normalize_hour(25), 1);
        assert_eq!(normalize_hour(99), 3);
        assert_eq!(normalize_hour(-5), 0);
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Midday);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Night);
    }

    #[test]
    fn out_of_box_coordinates_are_flagged() {
        let bounds = LocationBounds::default();

        let precise = bounds.resolve(Some(40.44), Some(-79.99));
        assert!(!precise.estimated);
        assert!((precise.latitude - 40.44).abs() < f64::EPSILON);

        for (lat, lon) in [
            (None, Some(-79.99)),
            (Some(40.44), None),
            (Some(0.0), Some(0.0)),
            (Some(f64::NAN), Some(-79.99)),
        ] {
            let resolved = bounds.resolve(lat, lon);
            assert!(resolved.estimated, "{lat:?},{lon:?} should be estimated");
            assert!((resolved.latitude - bounds.fallback_latitude).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn record_derived_fields() {
        let record = CrashRecord {
            id: "1".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2023, 7, 15)
                .unwrap()
                .and_hms_opt(18, 30, 0)
                .unwrap(),
            hour_of_day: 18,
            weather: "1".to_string(),
            road_condition: "1".to_string(),
            fatal_count: 1,
            injury_count: 2,
            longitude: -79.99,
            latitude: 40.44,
            estimated_location: false,
        };

        assert_eq!(record.severity_score(), 5);
        assert!(record.is_severe());
        assert_eq!(record.month(), 7);
        assert!(record.is_weekend(), "2023-07-15 is a Saturday");
        assert_eq!(record.time_of_day(), TimeOfDay::Evening);
    }
}
