//! The engine callers drive: one hotspot model and one risk model.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use crash_risk_analytics_models::{
    HotspotPrediction, RiskEstimate, RiskQuery, TrainingMetrics, TrainingReport,
};
use crash_risk_crash_models::CrashRecord;

use crate::AnalyticsError;
use crate::config::AnalyticsConfig;
use crate::hotspot::HotspotModel;
use crate::risk::RiskModel;
use crate::source::{CrashSource, TimeRange};
use crate::store::{ArtifactStore, FileArtifactStore};

/// Owns both models and exposes the training and prediction operations.
///
/// Construct one per deployment and share it by reference; every method
/// takes `&self`. Concurrent predictions are safe. Concurrent training of
/// the same model must be serialized by the caller.
#[derive(Debug)]
pub struct CrashRiskEngine {
    hotspots: HotspotModel,
    risk: RiskModel,
}

impl CrashRiskEngine {
    /// Creates an engine whose models persist through `store`.
    #[must_use]
    pub fn new(config: &AnalyticsConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            hotspots: HotspotModel::new(config.clustering, Arc::clone(&store)),
            risk: RiskModel::new(config.risk, store),
        }
    }

    /// Creates an engine persisting model files under `dir`.
    #[must_use]
    pub fn with_model_dir(config: &AnalyticsConfig, dir: impl Into<PathBuf>) -> Self {
        Self::new(config, Arc::new(FileArtifactStore::new(dir)))
    }

    /// The hotspot model.
    #[must_use]
    pub const fn hotspot_model(&self) -> &HotspotModel {
        &self.hotspots
    }

    /// The risk model.
    #[must_use]
    pub const fn risk_model(&self) -> &RiskModel {
        &self.risk
    }

    /// Trains the hotspot model on `records`.
    ///
    /// # Errors
    ///
    /// See [`HotspotModel::train`].
    pub fn train_hotspots(&self, records: &[CrashRecord]) -> Result<TrainingReport, AnalyticsError> {
        self.hotspots.train(records)
    }

    /// Fetches records from `source` and trains the hotspot model.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Source`] if fetching fails, otherwise see
    /// [`HotspotModel::train`].
    pub fn train_hotspots_from(
        &self,
        source: &dyn CrashSource,
        range: Option<&TimeRange>,
    ) -> Result<TrainingReport, AnalyticsError> {
        let records = source.fetch_crashes(range)?;
        log::info!("Fetched {} crash records", records.len());
        self.hotspots.train(&records)
    }

    /// Forecasts hotspots for `window_hours` hours from `now`.
    ///
    /// # Errors
    ///
    /// See [`HotspotModel::predict`].
    pub fn predict_hotspots(
        &self,
        now: NaiveDateTime,
        window_hours: u32,
        min_crashes: f64,
    ) -> Result<Vec<HotspotPrediction>, AnalyticsError> {
        self.hotspots.predict(now, window_hours, min_crashes)
    }

    /// Loads the persisted hotspot bundle. Returns `false` if there is none.
    ///
    /// # Errors
    ///
    /// See [`HotspotModel::load`].
    pub fn load_hotspots(&self) -> Result<bool, AnalyticsError> {
        self.hotspots.load()
    }

    /// Trains the risk model on `records`.
    ///
    /// # Errors
    ///
    /// See [`RiskModel::train`].
    pub fn train_risk(&self, records: &[CrashRecord]) -> Result<TrainingMetrics, AnalyticsError> {
        self.risk.train(records)
    }

    /// Fetches records from `source` and trains the risk model.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Source`] if fetching fails, otherwise see
    /// [`RiskModel::train`].
    pub fn train_risk_from(
        &self,
        source: &dyn CrashSource,
        range: Option<&TimeRange>,
    ) -> Result<TrainingMetrics, AnalyticsError> {
        let records = source.fetch_crashes(range)?;
        log::info!("Fetched {} crash records", records.len());
        self.risk.train(&records)
    }

    /// Estimates risk at a point; an omitted timestamp means the current
    /// local time.
    ///
    /// # Errors
    ///
    /// See [`RiskModel::predict`].
    pub fn predict_risk(&self, query: &RiskQuery) -> Result<RiskEstimate, AnalyticsError> {
        self.risk.predict(query, Local::now().naive_local())
    }

    /// Loads the persisted risk bundle. Returns `false` if there is none or
    /// it cannot be used.
    ///
    /// # Errors
    ///
    /// See [`RiskModel::load`].
    pub fn load_risk_model(&self) -> Result<bool, AnalyticsError> {
        self.risk.load()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;

    use super::*;
    use crate::config::RiskConfig;
    use crate::source::VecCrashSource;
    use crate::store::MemoryArtifactStore;

    fn crash(i: u32, lat: f64, lon: f64, hour: u8, fatal: u32, injury: u32) -> CrashRecord {
        CrashRecord {
            id: format!("e{i}"),
            timestamp: NaiveDate::from_ymd_opt(2023, 1 + i % 12, 1 + i % 28)
                .unwrap()
                .and_hms_opt(u32::from(hour), 15, 0)
                .unwrap(),
            hour_of_day: hour,
            weather: if fatal > 0 { "rain" } else { "clear" }.to_string(),
            road_condition: if fatal > 0 { "wet" } else { "dry" }.to_string(),
            fatal_count: fatal,
            injury_count: injury,
            longitude: lon,
            latitude: lat,
            estimated_location: false,
        }
    }

    /// Three intersections with repeated crashes plus scattered singles.
    fn history() -> Vec<CrashRecord> {
        let sites = [(40.79, -77.86), (40.44, -79.99), (39.95, -75.16)];
        let mut records = Vec::new();
        let mut i = 0;
        for (s, (lat, lon)) in sites.iter().enumerate() {
            for k in 0..(8 + 4 * s) {
                let k = u32::try_from(k).unwrap();
                let d = f64::from(k % 3) * 0.0003;
                let fatal = u32::from(k % 4 == 0);
                let hour = u8::try_from((k * 5 + 16) % 24).unwrap();
                records.push(crash(i, lat + d, lon - d, hour, fatal, k % 3));
                i += 1;
            }
        }
        for j in 0..6 {
            let j = f64::from(j);
            records.push(crash(i, 41.0 + j * 0.3, -78.0 + j * 0.4, 3, 0, 0));
            i += 1;
        }
        records
    }

    fn engine() -> CrashRiskEngine {
        let config = AnalyticsConfig {
            risk: RiskConfig {
                n_estimators: 15,
                boosting_estimators: 20,
                ..RiskConfig::default()
            },
            ..AnalyticsConfig::default()
        };
        CrashRiskEngine::new(&config, Arc::new(MemoryArtifactStore::new()))
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 18)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn hotspots_before_training_are_not_trained() {
        assert!(matches!(
            engine().predict_hotspots(at(8), 24, 5.0),
            Err(AnalyticsError::ModelNotTrained { .. })
        ));
        assert!(!engine().load_hotspots().unwrap());
        assert!(!engine().load_risk_model().unwrap());
    }

    #[test]
    fn hotspot_ranking_is_sorted_and_thresholded() {
        let engine = engine();
        let report = engine.train_hotspots(&history()).unwrap();
        assert_eq!(report.n_clusters, 3);
        assert_eq!(report.noise_points, 6);
        assert_eq!(report.total_crashes_in_hotspots, 8 + 12 + 16);

        for window in [1, 6, 24, 30] {
            let predictions = engine.predict_hotspots(at(18), window, 2.0).unwrap();
            assert!(predictions.iter().all(|p| p.risk_score > 2.0));
            for pair in predictions.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                assert!(
                    a.risk_score > b.risk_score
                        || (a.risk_score.total_cmp(&b.risk_score).is_eq()
                            && (a.crash_count > b.crash_count
                                || (a.crash_count == b.crash_count
                                    && a.cluster_id < b.cluster_id))),
                    "out of order: {a:?} before {b:?}"
                );
            }
        }
    }

    #[test]
    fn hotspot_training_is_idempotent() {
        let engine = engine();
        let first = engine.train_hotspots(&history()).unwrap();
        let first_predictions = engine.predict_hotspots(at(7), 12, 0.0).unwrap();
        let second = engine.train_hotspots(&history()).unwrap();
        let second_predictions = engine.predict_hotspots(at(7), 12, 0.0).unwrap();

        assert_eq!(first.hotspots, second.hotspots);
        assert_eq!(first_predictions, second_predictions);
    }

    #[test]
    fn cluster_invariants_hold() {
        let engine = engine();
        let records = history();
        let report = engine.train_hotspots(&records).unwrap();
        for cluster in &report.hotspots {
            assert!(cluster.radius_km >= 0.0);
            let near: Vec<&CrashRecord> = records
                .iter()
                .filter(|r| {
                    (r.latitude - cluster.center.latitude).abs() < 0.01
                        && (r.longitude - cluster.center.longitude).abs() < 0.01
                })
                .collect();
            assert_eq!(near.len(), cluster.crash_count);
            let lat_min = near.iter().map(|r| r.latitude).fold(f64::INFINITY, f64::min);
            let lat_max = near.iter().map(|r| r.latitude).fold(f64::NEG_INFINITY, f64::max);
            assert!((lat_min..=lat_max).contains(&cluster.center.latitude));
            let hours: f64 = cluster.time_patterns.values().sum();
            assert!((hours - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn risk_round_trip_through_files() {
        let tmp = std::env::temp_dir().join("crash_risk_engine_test");
        let _ = fs::remove_dir_all(&tmp);

        let config = AnalyticsConfig {
            risk: RiskConfig {
                n_estimators: 10,
                boosting_estimators: 10,
                ..RiskConfig::default()
            },
            ..AnalyticsConfig::default()
        };
        let source = VecCrashSource::new(history());

        let trainer = CrashRiskEngine::with_model_dir(&config, &tmp);
        let metrics = trainer.train_risk_from(&source, None).unwrap();
        assert_eq!(metrics.train_size + metrics.test_size, 42);
        trainer.train_hotspots_from(&source, None).unwrap();
        assert!(tmp.join(crate::RISK_ARTIFACT).exists());
        assert!(tmp.join(crate::HOTSPOT_ARTIFACT).exists());

        let query = RiskQuery {
            timestamp: Some("2024-10-18T17:00:00".to_string()),
            ..RiskQuery::at(40.79, -77.86)
        };
        let expected = trainer.predict_risk(&query).unwrap();

        let fresh = CrashRiskEngine::with_model_dir(&config, &tmp);
        assert!(fresh.load_risk_model().unwrap());
        assert_eq!(fresh.predict_risk(&query).unwrap(), expected);
        assert_eq!(
            fresh.predict_hotspots(at(17), 3, 0.0).unwrap(),
            trainer.predict_hotspots(at(17), 3, 0.0).unwrap()
        );

        // Cleanup
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn risk_defaults_missing_conditions() {
        let engine = engine();
        engine.train_risk(&history()).unwrap();
        let estimate = engine.predict_risk(&RiskQuery::at(40.0, -77.0)).unwrap();
        assert!((estimate.features_used.weather_risk - 1.0).abs() < f64::EPSILON);
        assert!((estimate.features_used.road_risk - 1.0).abs() < f64::EPSILON);
        assert!((0.0..=1.0).contains(&estimate.severe_crash_probability));
        assert!(estimate.expected_severity_score >= 0.0);
    }

    #[test]
    fn predictions_run_concurrently() {
        let engine = engine();
        engine.train_hotspots(&history()).unwrap();
        let expected = engine.predict_hotspots(at(20), 4, 0.0).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| engine.predict_hotspots(at(20), 4, 0.0).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn unreadable_risk_artifact_loads_as_false() {
        let tmp = std::env::temp_dir().join("crash_risk_engine_corrupt_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        fs::write(tmp.join(crate::RISK_ARTIFACT), [0xc1, 0x00, 0x7f]).unwrap();

        let engine = CrashRiskEngine::with_model_dir(&AnalyticsConfig::default(), &tmp);
        assert!(!engine.load_risk_model().unwrap());
        assert!(matches!(
            engine.predict_risk(&RiskQuery::at(40.79, -77.86)),
            Err(AnalyticsError::ModelNotTrained { .. })
        ));

        // Cleanup
        let _ = fs::remove_dir_all(&tmp);
    }
}
