//! Hotspot model: clusters plus hourly weights, re-scored per time window.

use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Duration, NaiveDateTime, Timelike};
use crash_risk_analytics_models::{Cluster, HotspotPrediction, TemporalWeights, TrainingReport};
use crash_risk_crash_models::CrashRecord;
use crash_risk_ml::StandardScaler;
use crash_risk_spatial::SpatialClusterer;
use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::store::{ArtifactStore, load_bundle, save_bundle};
use crate::{AnalyticsError, temporal};

/// Artifact name of the persisted hotspot bundle.
pub const HOTSPOT_ARTIFACT: &str = "hotspot_model.msgpack";

const TEMPORAL_WEIGHT: f64 = 0.4;
const SEVERITY_WEIGHT: f64 = 0.6;

/// Everything a trained hotspot model consists of. Persisted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotState {
    /// Clusters found at training time.
    pub clusters: Vec<Cluster>,
    /// Hour-of-day weights over all training records.
    pub temporal_weights: TemporalWeights,
    /// Scaler fitted on the clustered `[latitude, longitude]` pairs.
    pub scaler: StandardScaler,
}

impl HotspotState {
    /// Scores every cluster against the window starting at `now` and keeps
    /// those above `min_crashes`, highest risk first.
    fn score(
        &self,
        now: NaiveDateTime,
        valid_until: NaiveDateTime,
        window_hours: u32,
        min_crashes: f64,
    ) -> Vec<HotspotPrediction> {
        #[allow(clippy::cast_possible_truncation)]
        let temporal_risk = self
            .temporal_weights
            .window_average(now.hour() as u8, window_hours);

        let mut predictions: Vec<HotspotPrediction> = self
            .clusters
            .iter()
            .filter_map(|cluster| {
                let severity_risk = cluster.severity_risk();
                #[allow(clippy::cast_precision_loss)]
                let risk_score = TEMPORAL_WEIGHT
                    .mul_add(temporal_risk, SEVERITY_WEIGHT * severity_risk)
                    * cluster.crash_count as f64;

                (risk_score > min_crashes).then(|| HotspotPrediction {
                    cluster_id: cluster.cluster_id,
                    location: cluster.center,
                    radius_km: cluster.radius_km,
                    risk_score,
                    severity_risk,
                    temporal_risk,
                    crash_count: cluster.crash_count,
                    fatal_count: cluster.fatal_count,
                    injury_count: cluster.injury_count,
                    weather_patterns: cluster.weather_patterns.clone(),
                    road_conditions: cluster.road_conditions.clone(),
                    time_patterns: cluster.time_patterns.clone(),
                    period_patterns: cluster.period_patterns.clone(),
                    prediction_time: now,
                    valid_until,
                })
            })
            .collect();

        predictions.sort_by(rank);
        predictions
    }
}

/// Risk descending, then crash count descending, then cluster id ascending.
fn rank(a: &HotspotPrediction, b: &HotspotPrediction) -> Ordering {
    b.risk_score
        .total_cmp(&a.risk_score)
        .then_with(|| b.crash_count.cmp(&a.crash_count))
        .then_with(|| a.cluster_id.cmp(&b.cluster_id))
}

/// Detects crash hotspots and forecasts which are active in a time window.
///
/// Untrained until [`train`](Self::train) or [`load`](Self::load) succeeds.
/// [`predict`](Self::predict) lazily loads the persisted bundle if nothing
/// is resident. Predictions only read an immutable snapshot, so they may
/// run concurrently; retraining swaps the snapshot wholesale.
pub struct HotspotModel {
    config: ClusteringConfig,
    store: Arc<dyn ArtifactStore>,
    state: RwLock<Option<Arc<HotspotState>>>,
}

impl std::fmt::Debug for HotspotModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotspotModel")
            .field("config", &self.config)
            .field("trained", &self.state().is_some())
            .finish_non_exhaustive()
    }
}

impl HotspotModel {
    /// Creates an untrained model persisting through `store`.
    #[must_use]
    pub fn new(config: ClusteringConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            state: RwLock::new(None),
        }
    }

    /// The resident state, if any.
    #[must_use]
    pub fn state(&self) -> Option<Arc<HotspotState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_state(&self, state: HotspotState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(state));
    }

    /// Clusters `records`, weights them by hour, persists the result and
    /// makes it the resident state.
    ///
    /// Records with an estimated location are left out of clustering unless
    /// configured otherwise, but always count toward the hourly weights.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InsufficientData`] if fewer than two records are
    ///   eligible for clustering
    /// * [`AnalyticsError::Artifact`] if the bundle cannot be persisted; the
    ///   previous state stays resident
    pub fn train(&self, records: &[CrashRecord]) -> Result<TrainingReport, AnalyticsError> {
        log::info!("Training hotspot model on {} records", records.len());

        let eligible: Vec<&CrashRecord> = records
            .iter()
            .filter(|r| self.config.include_estimated_locations || !r.estimated_location)
            .collect();
        if eligible.len() < records.len() {
            log::info!(
                "Skipping {} records with estimated locations",
                records.len() - eligible.len()
            );
        }

        let clustering = SpatialClusterer::new(self.config.cluster_config()).cluster(&eligible)?;
        let temporal_weights = temporal::weights(records)?;

        let report = TrainingReport {
            n_clusters: clustering.clusters.len(),
            total_crashes_in_hotspots: clustering.clusters.iter().map(|c| c.crash_count).sum(),
            noise_points: clustering.noise_points,
            records_used: eligible.len(),
            hotspots: clustering.clusters.clone(),
        };

        let state = HotspotState {
            clusters: clustering.clusters,
            temporal_weights,
            scaler: clustering.scaler,
        };
        save_bundle(self.store.as_ref(), HOTSPOT_ARTIFACT, &state)?;
        self.replace_state(state);

        log::info!(
            "Hotspot model trained: {} clusters covering {} crashes",
            report.n_clusters,
            report.total_crashes_in_hotspots
        );

        Ok(report)
    }

    /// Loads the persisted bundle into memory, replacing any resident
    /// state. Returns `false` if nothing has been persisted.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Artifact`] if the bundle exists but cannot
    /// be read or decoded.
    pub fn load(&self) -> Result<bool, AnalyticsError> {
        let Some(state) = load_bundle::<HotspotState>(self.store.as_ref(), HOTSPOT_ARTIFACT)?
        else {
            return Ok(false);
        };
        log::info!(
            "Loaded hotspot model with {} clusters",
            state.clusters.len()
        );
        self.replace_state(state);
        Ok(true)
    }

    fn resident_or_load(&self) -> Result<Arc<HotspotState>, AnalyticsError> {
        if let Some(state) = self.state() {
            return Ok(state);
        }
        log::info!("No resident hotspot model, loading from store");
        if self.load()?
            && let Some(state) = self.state()
        {
            return Ok(state);
        }
        Err(AnalyticsError::ModelNotTrained { model: "hotspot" })
    }

    /// Forecasts hotspots for the `window_hours` hours starting at `now`.
    ///
    /// Each cluster scores `(0.4 * temporal + 0.6 * severity) * crash_count`
    /// where `temporal` is the mean hourly weight over the window (wrapping
    /// past midnight) and `severity` is the cluster's harm per crash. Only
    /// clusters scoring strictly above `min_crashes` are returned, ordered
    /// by score, then crash count (both descending), then cluster id.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InvalidInput`] if `window_hours` is zero or the
    ///   window end is not representable
    /// * [`AnalyticsError::ModelNotTrained`] if nothing is resident or
    ///   persisted
    pub fn predict(
        &self,
        now: NaiveDateTime,
        window_hours: u32,
        min_crashes: f64,
    ) -> Result<Vec<HotspotPrediction>, AnalyticsError> {
        if window_hours == 0 {
            return Err(AnalyticsError::InvalidInput {
                message: "time window must be at least one hour".to_string(),
            });
        }
        let valid_until = now
            .checked_add_signed(Duration::hours(i64::from(window_hours)))
            .ok_or_else(|| AnalyticsError::InvalidInput {
                message: format!("a {window_hours} hour window from {now} is out of range"),
            })?;

        let state = self.resident_or_load()?;
        let predictions = state.score(now, valid_until, window_hours, min_crashes);

        log::debug!(
            "{} of {} hotspots above threshold {min_crashes} for {now} + {window_hours}h",
            predictions.len(),
            state.clusters.len()
        );

        Ok(predictions)
    }
}
