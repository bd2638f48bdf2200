#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Density-based spatial clustering of crash locations.
//!
//! Coordinates are standardized to zero mean and unit variance, clustered
//! with DBSCAN over an R-tree, and each resulting cluster is summarized
//! (centroid, radius, harm totals, weather/road/hour distributions).
//! Points in no dense neighborhood are noise and belong to no cluster.

mod dbscan;
mod stats;

pub use dbscan::dbscan;
pub use stats::KM_PER_DEGREE;

use crash_risk_analytics_models::Cluster;
use crash_risk_crash_models::CrashRecord;
use crash_risk_ml::{MlError, StandardScaler};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while clustering.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
    /// Too few points to cluster.
    #[error("Not enough points to cluster: need at least {required}, got {found}")]
    InsufficientData {
        /// Minimum number of points.
        required: usize,
        /// Points supplied.
        found: usize,
    },

    /// A point has a NaN or infinite coordinate.
    #[error("Point {index} has a non-finite coordinate")]
    InvalidCoordinate {
        /// Position of the offending point.
        index: usize,
    },

    /// Clustering parameters are out of range.
    #[error("Invalid clustering config: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// Coordinate standardization failed.
    #[error("Scaling error: {0}")]
    Scaling(#[from] MlError),
}

/// Anything with a location and the attributes summarized per cluster.
pub trait CrashPoint {
    /// Latitude (WGS84).
    fn latitude(&self) -> f64;
    /// Longitude (WGS84).
    fn longitude(&self) -> f64;
    /// Fatalities.
    fn fatal_count(&self) -> u32;
    /// Injuries.
    fn injury_count(&self) -> u32;
    /// Raw weather code.
    fn weather(&self) -> &str;
    /// Raw road-condition code.
    fn road_condition(&self) -> &str;
    /// Hour of day (0-23).
    fn hour_of_day(&self) -> u8;
}

impl CrashPoint for CrashRecord {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }

    fn fatal_count(&self) -> u32 {
        self.fatal_count
    }

    fn injury_count(&self) -> u32 {
        self.injury_count
    }

    fn weather(&self) -> &str {
        &self.weather
    }

    fn road_condition(&self) -> &str {
        &self.road_condition
    }

    fn hour_of_day(&self) -> u8 {
        self.hour_of_day
    }
}

impl<T: CrashPoint + ?Sized> CrashPoint for &T {
    fn latitude(&self) -> f64 {
        (**self).latitude()
    }

    fn longitude(&self) -> f64 {
        (**self).longitude()
    }

    fn fatal_count(&self) -> u32 {
        (**self).fatal_count()
    }

    fn injury_count(&self) -> u32 {
        (**self).injury_count()
    }

    fn weather(&self) -> &str {
        (**self).weather()
    }

    fn road_condition(&self) -> &str {
        (**self).road_condition()
    }

    fn hour_of_day(&self) -> u8 {
        (**self).hour_of_day()
    }
}

/// DBSCAN parameters.
///
/// `eps` is measured in *standardized* coordinate units, so the ground
/// distance it covers depends on the spread of the training data and on
/// latitude (a degree of longitude shrinks toward the poles). Re-tune it
/// per deployment region; [`ClusterConfig::eps_for_radius_km`] converts a
/// target neighborhood radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Neighborhood radius in standardized units.
    pub eps: f64,
    /// Points (including itself) a neighborhood needs for its center to be
    /// a core point.
    pub min_samples: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps: 0.01,
            min_samples: 3,
        }
    }
}

impl ClusterConfig {
    /// Standardized `eps` for a neighborhood of `radius_km` when the
    /// training coordinates have a standard deviation of
    /// `coordinate_std_deg` degrees.
    #[must_use]
    pub fn eps_for_radius_km(radius_km: f64, coordinate_std_deg: f64) -> f64 {
        radius_km / KM_PER_DEGREE / coordinate_std_deg
    }

    fn validate(&self) -> Result<(), SpatialError> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(SpatialError::InvalidConfig {
                message: format!("eps must be a positive number, got {}", self.eps),
            });
        }
        if self.min_samples == 0 {
            return Err(SpatialError::InvalidConfig {
                message: "min_samples must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Output of one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One summary per cluster, ordered by cluster id.
    pub clusters: Vec<Cluster>,
    /// Cluster id per input point, `None` for noise.
    pub labels: Vec<Option<usize>>,
    /// Number of noise points.
    pub noise_points: usize,
    /// Scaler fitted on the `[latitude, longitude]` pairs.
    pub scaler: StandardScaler,
}

/// Groups crash locations into dense clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialClusterer {
    config: ClusterConfig,
}

impl SpatialClusterer {
    /// Creates a clusterer with the given parameters.
    #[must_use]
    pub const fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// The parameters in use.
    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Clusters `points` and summarizes every non-noise cluster.
    ///
    /// Deterministic for a given input order and config. If every point is
    /// noise the result simply has no clusters.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::InsufficientData`] for fewer than two points
    /// * [`SpatialError::InvalidCoordinate`] for a NaN/infinite coordinate
    /// * [`SpatialError::InvalidConfig`] for a bad `eps`/`min_samples`
    pub fn cluster<P: CrashPoint>(&self, points: &[P]) -> Result<Clustering, SpatialError> {
        self.config.validate()?;
        if points.len() < 2 {
            return Err(SpatialError::InsufficientData {
                required: 2,
                found: points.len(),
            });
        }
        if let Some(index) = points
            .iter()
            .position(|p| !(p.latitude().is_finite() && p.longitude().is_finite()))
        {
            return Err(SpatialError::InvalidCoordinate { index });
        }

        let coords: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [p.latitude(), p.longitude()])
            .collect();
        let scaler = StandardScaler::fit(&coords)?;
        let scaled: Vec<[f64; 2]> = coords
            .iter()
            .map(|c| {
                scaler
                    .transform_row(c)
                    .map(|row| [row[0], row[1]])
            })
            .collect::<Result<_, _>>()?;

        let labels = dbscan(&scaled, self.config.eps, self.config.min_samples);

        let n_clusters = labels.iter().flatten().max().map_or(0, |max| max + 1);
        let mut members: Vec<Vec<&P>> = vec![Vec::new(); n_clusters];
        let mut noise_points = 0;
        for (point, label) in points.iter().zip(&labels) {
            match label {
                Some(id) => members[*id].push(point),
                None => noise_points += 1,
            }
        }

        let clusters: Vec<Cluster> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(id, m)| stats::summarize(id, m))
            .collect();

        log::info!(
            "Found {} clusters ({noise_points} noise points) among {} points",
            clusters.len(),
            points.len()
        );

        Ok(Clustering {
            clusters,
            labels,
            noise_points,
            scaler,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn crash(lat: f64, lon: f64, hour: u8, weather: &str, fatal: u32, injury: u32) -> CrashRecord {
        CrashRecord {
            id: format!("{lat},{lon}"),
            timestamp: NaiveDate::from_ymd_opt(2023, 3, 1)
                .unwrap()
                .and_hms_opt(u32::from(hour), 0, 0)
                .unwrap(),
            hour_of_day: hour,
            weather: weather.to_string(),
            road_condition: "1".to_string(),
            fatal_count: fatal,
            injury_count: injury,
            longitude: lon,
            latitude: lat,
            estimated_location: false,
        }
    }

    /// Three tight groups of five crashes plus one isolated crash.
    fn three_hotspots() -> Vec<CrashRecord> {
        let centers = [(40.0, -77.0), (40.5, -77.5), (41.0, -76.5)];
        let offsets = [
            (0.0, 0.0),
            (0.0005, 0.0),
            (0.0, 0.0005),
            (-0.0005, 0.0),
            (0.0, -0.0005),
        ];
        let mut records = Vec::new();
        for (c, (lat, lon)) in centers.iter().enumerate() {
            for (i, (dlat, dlon)) in offsets.iter().enumerate() {
                let hour = u8::try_from(c * 5 + i).unwrap();
                let weather = if i % 2 == 0 { "1" } else { "3" };
                records.push(crash(lat + dlat, lon + dlon, hour, weather, u32::from(i == 0), 1));
            }
        }
        records.push(crash(40.25, -76.0, 12, "1", 0, 0));
        records
    }

    #[test]
    fn finds_dense_groups_and_drops_noise() {
        let records = three_hotspots();
        let result = SpatialClusterer::default().cluster(&records).unwrap();

        assert_eq!(result.clusters.len(), 3);
        assert_eq!(result.noise_points, 1);
        assert_eq!(result.labels.last(), Some(&None));
        for cluster in &result.clusters {
            assert_eq!(cluster.crash_count, 5);
            assert_eq!(cluster.fatal_count, 1);
            assert_eq!(cluster.injury_count, 5);
        }
    }

    #[test]
    fn cluster_geometry_is_sane() {
        let records = three_hotspots();
        let result = SpatialClusterer::default().cluster(&records).unwrap();

        for cluster in &result.clusters {
            let members: Vec<&CrashRecord> = records
                .iter()
                .zip(&result.labels)
                .filter(|(_, l)| **l == Some(cluster.cluster_id))
                .map(|(r, _)| r)
                .collect();

            assert!(cluster.radius_km >= 0.0);
            // 0.0005° at 111 km/° ≈ 55 m
            assert!((cluster.radius_km - 0.0555).abs() < 1e-3, "{}", cluster.radius_km);

            let min_lat = members.iter().map(|r| r.latitude).fold(f64::INFINITY, f64::min);
            let max_lat = members.iter().map(|r| r.latitude).fold(f64::NEG_INFINITY, f64::max);
            let min_lon = members.iter().map(|r| r.longitude).fold(f64::INFINITY, f64::min);
            let max_lon = members.iter().map(|r| r.longitude).fold(f64::NEG_INFINITY, f64::max);
            assert!((min_lat..=max_lat).contains(&cluster.center.latitude));
            assert!((min_lon..=max_lon).contains(&cluster.center.longitude));
        }
    }

    #[test]
    fn distributions_sum_to_one() {
        let records = three_hotspots();
        let result = SpatialClusterer::default().cluster(&records).unwrap();

        for cluster in &result.clusters {
            for total in [
                cluster.weather_patterns.values().sum::<f64>(),
                cluster.road_conditions.values().sum::<f64>(),
                cluster.time_patterns.values().sum::<f64>(),
                cluster.period_patterns.values().sum::<f64>(),
            ] {
                assert!((total - 1.0).abs() < 1e-9, "distribution sums to {total}");
            }
            assert!((cluster.weather_patterns["1"] - 0.6).abs() < 1e-12);
            assert!((cluster.weather_patterns["3"] - 0.4).abs() < 1e-12);
        }
    }

    #[test]
    fn clustering_is_deterministic() {
        let records = three_hotspots();
        let clusterer = SpatialClusterer::default();
        assert_eq!(
            clusterer.cluster(&records).unwrap(),
            clusterer.cluster(&records).unwrap()
        );
    }

    #[test]
    fn fewer_than_two_points_is_insufficient() {
        let clusterer = SpatialClusterer::default();
        let none: Vec<CrashRecord> = Vec::new();
        assert_eq!(
            clusterer.cluster(&none).unwrap_err(),
            SpatialError::InsufficientData {
                required: 2,
                found: 0
            }
        );
        let one = vec![crash(40.0, -77.0, 8, "1", 0, 0)];
        assert!(matches!(
            clusterer.cluster(&one),
            Err(SpatialError::InsufficientData { found: 1, .. })
        ));
    }

    #[test]
    fn two_distant_points_are_all_noise() {
        // Roughly 11 km apart; with min_samples = 3 neither can be core.
        let records = vec![crash(40.0, -77.0, 8, "1", 0, 0), crash(40.1, -77.0, 9, "1", 0, 0)];
        let result = SpatialClusterer::default().cluster(&records).unwrap();
        assert!(result.clusters.is_empty());
        assert_eq!(result.noise_points, 2);
    }

    #[test]
    fn rejects_bad_config_and_coordinates() {
        let records = three_hotspots();
        let bad = SpatialClusterer::new(ClusterConfig {
            eps: 0.0,
            min_samples: 3,
        });
        assert!(matches!(
            bad.cluster(&records),
            Err(SpatialError::InvalidConfig { .. })
        ));

        let mut records = records;
        records[2].latitude = f64::NAN;
        assert_eq!(
            SpatialClusterer::default().cluster(&records).unwrap_err(),
            SpatialError::InvalidCoordinate { index: 2 }
        );
    }

    #[test]
    fn eps_conversion() {
        let eps = ClusterConfig::eps_for_radius_km(0.5, 0.45);
        assert!((eps - 0.5 / 111.0 / 0.45).abs() < 1e-15);
    }
}
