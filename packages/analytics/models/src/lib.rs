#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input and output types for the crash risk engine.
//!
//! Defines the engineered feature vector, the trained hotspot cluster
//! shape, hourly temporal weights, and the request/response types for the
//! hotspot and point-risk predictions.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use crash_risk_crash_models::TimeOfDay;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of engineered features.
pub const FEATURE_COUNT: usize = 9;

/// Feature names in the order produced by [`FeatureVector::to_array`].
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "hour_sin",
    "hour_cos",
    "month_sin",
    "month_cos",
    "is_weekend",
    "weather_risk",
    "road_risk",
    "longitude",
    "latitude",
];

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// Numeric features for one crash or query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// `sin(2π·hour/24)`
    pub hour_sin: f64,
    /// `cos(2π·hour/24)`
    pub hour_cos: f64,
    /// `sin(2π·month/12)`
    pub month_sin: f64,
    /// `cos(2π·month/12)`
    pub month_cos: f64,
    /// `1.0` on Saturday/Sunday, else `0.0`.
    pub is_weekend: f64,
    /// Weather ordinal (1-4).
    pub weather_risk: f64,
    /// Road-condition ordinal (1-4).
    pub road_risk: f64,
    /// Longitude, passed through.
    pub longitude: f64,
    /// Latitude, passed through.
    pub latitude: f64,
}

impl FeatureVector {
    /// Flattens into model column order (see [`FEATURE_NAMES`]).
    #[must_use]
    pub const fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.hour_sin,
            self.hour_cos,
            self.month_sin,
            self.month_cos,
            self.is_weekend,
            self.weather_risk,
            self.road_risk,
            self.longitude,
            self.latitude,
        ]
    }

    /// Names of features that are NaN or infinite.
    #[must_use]
    pub fn non_finite(&self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .zip(self.to_array())
            .filter(|(_, v)| !v.is_finite())
            .map(|(name, _)| *name)
            .collect()
    }
}

/// A dense group of historical crashes found by spatial clustering.
///
/// Cluster ids are only stable within one trained model generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Cluster label, assigned in discovery order.
    pub cluster_id: usize,
    /// Number of member crashes.
    pub crash_count: usize,
    /// Total fatalities across members.
    pub fatal_count: u64,
    /// Total injuries across members.
    pub injury_count: u64,
    /// Arithmetic mean of member coordinates.
    pub center: GeoPoint,
    /// Farthest member distance from the centroid, in kilometers.
    pub radius_km: f64,
    /// Weather code → fraction of members.
    pub weather_patterns: BTreeMap<String, f64>,
    /// Road-condition code → fraction of members.
    pub road_conditions: BTreeMap<String, f64>,
    /// Hour of day → fraction of members.
    pub time_patterns: BTreeMap<u8, f64>,
    /// Time-of-day bucket → fraction of members.
    pub period_patterns: BTreeMap<TimeOfDay, f64>,
}

impl Cluster {
    /// Mean weighted harm per member: `(3·fatal + injury) / max(count, 1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn severity_risk(&self) -> f64 {
        (self.fatal_count as f64).mul_add(3.0, self.injury_count as f64)
            / self.crash_count.max(1) as f64
    }
}

/// Fraction of all training crashes that happened in each hour of day.
///
/// Hours with no crashes are absent and read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalWeights {
    weights: BTreeMap<u8, f64>,
}

impl TemporalWeights {
    /// Wraps precomputed hour → fraction weights.
    #[must_use]
    pub const fn new(weights: BTreeMap<u8, f64>) -> Self {
        Self { weights }
    }

    /// Weight for an hour, `0.0` if unobserved.
    #[must_use]
    pub fn weight(&self, hour: u8) -> f64 {
        self.weights.get(&hour).copied().unwrap_or(0.0)
    }

    /// Average weight over `hours` consecutive hours starting at
    /// `start_hour`, wrapping past 23 back to 0. Zero hours averages to
    /// `0.0`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn window_average(&self, start_hour: u8, hours: u32) -> f64 {
        if hours == 0 {
            return 0.0;
        }
        let day: f64 = (0..24).map(|hour| self.weight(hour)).sum();
        let rest: f64 = (0..hours % 24)
            .map(|offset| self.weight(((u32::from(start_hour) + offset) % 24) as u8))
            .sum();
        f64::from(hours / 24).mul_add(day, rest) / f64::from(hours)
    }

    /// Sum of all weights (≈1.0 for a non-empty training set).
    #[must_use]
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Observed hours and their weights, in hour order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.weights.iter().map(|(h, w)| (*h, *w))
    }

    /// Number of observed hours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// `true` if no hour has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// A forecast danger zone for a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotPrediction {
    /// Id of the underlying cluster.
    pub cluster_id: usize,
    /// Cluster centroid.
    pub location: GeoPoint,
    /// Cluster radius in kilometers.
    pub radius_km: f64,
    /// `(0.4·temporal + 0.6·severity) · crash_count`
    pub risk_score: f64,
    /// Mean weighted harm per crash in the cluster.
    pub severity_risk: f64,
    /// Mean hourly weight across the prediction window.
    pub temporal_risk: f64,
    /// Historical crash count.
    pub crash_count: usize,
    /// Historical fatalities.
    pub fatal_count: u64,
    /// Historical injuries.
    pub injury_count: u64,
    /// Weather code → fraction of crashes.
    pub weather_patterns: BTreeMap<String, f64>,
    /// Road-condition code → fraction of crashes.
    pub road_conditions: BTreeMap<String, f64>,
    /// Hour of day → fraction of crashes.
    pub time_patterns: BTreeMap<u8, f64>,
    /// Time-of-day bucket → fraction of crashes.
    pub period_patterns: BTreeMap<TimeOfDay, f64>,
    /// Start of the validity window (inclusive).
    pub prediction_time: NaiveDateTime,
    /// End of the validity window (exclusive).
    pub valid_until: NaiveDateTime,
}

/// Summary returned by hotspot training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    /// Number of clusters found.
    pub n_clusters: usize,
    /// Crashes that landed in some cluster.
    pub total_crashes_in_hotspots: usize,
    /// Crashes labeled as noise.
    pub noise_points: usize,
    /// Crashes that took part in clustering.
    pub records_used: usize,
    /// The clusters themselves.
    pub hotspots: Vec<Cluster>,
}

/// Held-out evaluation of a trained risk model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
    /// Test-set accuracy of the severity classifier.
    pub severity_accuracy: f64,
    /// Test-set RMSE of the severity-score regressor.
    pub count_rmse: f64,
    /// Rows used for fitting.
    pub train_size: usize,
    /// Rows held out for evaluation.
    pub test_size: usize,
}

/// A point to score with the risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskQuery {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Weather code; defaults to `"1"` (clear).
    #[serde(default)]
    pub weather: Option<String>,
    /// Road-condition code; defaults to `"1"` (dry).
    #[serde(default)]
    pub road_condition: Option<String>,
    /// ISO 8601 timestamp; defaults to now.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RiskQuery {
    /// A query at a location with every other input defaulted.
    #[must_use]
    pub const fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            weather: None,
            road_condition: None,
            timestamp: None,
        }
    }
}

/// Discretized severe-crash probability.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Probability ≤ 0.3
    Low,
    /// 0.3 < probability ≤ 0.7
    Medium,
    /// Probability > 0.7
    High,
}

impl RiskLevel {
    /// Buckets a severe-crash probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.7 {
            Self::High
        } else if probability > 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// The resolved inputs a risk estimate was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesUsed {
    /// Hour of day.
    pub time: u8,
    /// Weather ordinal.
    pub weather_risk: f64,
    /// Road-condition ordinal.
    pub road_risk: f64,
    /// Whether the timestamp fell on a weekend.
    pub is_weekend: bool,
    /// Month (1-12).
    pub month: u32,
}

/// Point-wise risk prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEstimate {
    /// Classifier probability that a crash here would be severe.
    pub severe_crash_probability: f64,
    /// Regressor estimate of `3·fatal + injury`, floored at 0.
    pub expected_severity_score: f64,
    /// Discretized probability.
    pub risk_level: RiskLevel,
    /// Echo of the resolved inputs.
    pub features_used: FeaturesUsed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.71), RiskLevel::High);
        assert_eq!(RiskLevel::High.to_string(), "HIGH");
    }

    #[test]
    fn window_average_wraps_midnight() {
        let weights = TemporalWeights::new(BTreeMap::from([(23, 0.5), (0, 0.25), (1, 0.25)]));
        assert!((weights.window_average(23, 2) - 0.375).abs() < 1e-12);
        assert!((weights.window_average(22, 4) - 0.25).abs() < 1e-12);
        assert!(weights.window_average(5, 0).abs() < f64::EPSILON);
        assert!(weights.weight(12).abs() < f64::EPSILON);
        assert!((weights.window_average(0, 24) - 1.0 / 24.0).abs() < 1e-12);
    }

    #[test]
    fn multi_day_windows_count_whole_days_once_each() {
        let weights = TemporalWeights::new(BTreeMap::from([(23, 0.5), (0, 0.25), (1, 0.25)]));
        assert!((weights.window_average(23, 26) - 1.75 / 26.0).abs() < 1e-12);
        assert!((weights.window_average(12, 48) - 1.0 / 24.0).abs() < 1e-12);

        let huge = weights.window_average(0, u32::MAX);
        assert!((huge - 1.0 / 24.0).abs() < 1e-9, "{huge}");
    }

    #[test]
    fn severity_risk_guards_empty_clusters() {
        let mut cluster = Cluster {
            cluster_id: 0,
            crash_count: 4,
            fatal_count: 1,
            injury_count: 5,
            center: GeoPoint {
                latitude: 40.0,
                longitude: -77.0,
            },
            radius_km: 0.0,
            weather_patterns: BTreeMap::new(),
            road_conditions: BTreeMap::new(),
            time_patterns: BTreeMap::new(),
            period_patterns: BTreeMap::new(),
        };
        assert!((cluster.severity_risk() - 2.0).abs() < 1e-12);

        cluster.crash_count = 0;
        assert!((cluster.severity_risk() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_features_are_named() {
        let features = FeatureVector {
            hour_sin: 0.0,
            hour_cos: 1.0,
            month_sin: 0.5,
            month_cos: 0.5,
            is_weekend: 0.0,
            weather_risk: 1.0,
            road_risk: 1.0,
            longitude: f64::NAN,
            latitude: f64::INFINITY,
        };
        assert_eq!(features.non_finite(), vec!["longitude", "latitude"]);
    }
}
