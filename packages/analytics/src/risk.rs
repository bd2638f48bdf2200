//! Point risk model: severity classifier plus severity-score regressor.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDateTime;
use crash_risk_analytics_models::{
    FEATURE_COUNT, FEATURE_NAMES, FeaturesUsed, RiskEstimate, RiskLevel, RiskQuery,
    TrainingMetrics,
};
use crash_risk_crash_models::CrashRecord;
use crash_risk_ml::{
    GradientBoostingRegressor, RandomForestClassifier, StandardScaler, accuracy, rmse,
    train_test_split,
};
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;
use crate::config::RiskConfig;
use crate::features::{FeatureInput, engineer, parse_timestamp};
use crate::store::{ArtifactError, ArtifactStore, load_bundle, save_bundle};

/// Artifact name of the persisted risk bundle.
pub const RISK_ARTIFACT: &str = "risk_model.msgpack";

/// Code substituted for an omitted weather or road condition.
const DEFAULT_CODE: &str = "1";

/// Classifier, regressor and feature scaler. Only valid as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBundle {
    /// Predicts whether a crash is severe (any fatality or injury).
    pub classifier: RandomForestClassifier,
    /// Predicts `3 * fatal + injury`.
    pub regressor: GradientBoostingRegressor,
    /// Scaler fitted on the engineered feature matrix.
    pub scaler: StandardScaler,
}

impl RiskBundle {
    fn is_consistent(&self) -> bool {
        self.scaler.n_features() == FEATURE_COUNT
            && self.classifier.n_features() == FEATURE_COUNT
            && self.regressor.n_features() == FEATURE_COUNT
    }
}

/// Supervised risk predictor.
///
/// Untrained until [`train`](Self::train) or [`load`](Self::load) succeeds;
/// [`predict`](Self::predict) falls back to loading the persisted bundle.
pub struct RiskModel {
    config: RiskConfig,
    store: Arc<dyn ArtifactStore>,
    bundle: RwLock<Option<Arc<RiskBundle>>>,
}

impl std::fmt::Debug for RiskModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskModel")
            .field("config", &self.config)
            .field("trained", &self.bundle().is_some())
            .finish_non_exhaustive()
    }
}

fn non_finite_names(values: &[f64]) -> Vec<&'static str> {
    FEATURE_NAMES
        .iter()
        .zip(values)
        .filter(|(_, v)| !v.is_finite())
        .map(|(name, _)| *name)
        .collect()
}

impl RiskModel {
    /// Creates an untrained model persisting through `store`.
    #[must_use]
    pub fn new(config: RiskConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            store,
            bundle: RwLock::new(None),
        }
    }

    /// The resident bundle, if any.
    #[must_use]
    pub fn bundle(&self) -> Option<Arc<RiskBundle>> {
        self.bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_bundle(&self, bundle: RiskBundle) {
        *self.bundle.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(bundle));
    }

    /// Fits the classifier and regressor, persists them with the scaler and
    /// returns held-out metrics.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InsufficientData`] below `min_training_records`
    /// * [`AnalyticsError::MissingFeature`] if a record yields a non-finite
    ///   feature
    /// * [`AnalyticsError::Ml`] / [`AnalyticsError::Artifact`] if fitting or
    ///   persisting fails; the previous bundle stays resident
    pub fn train(&self, records: &[CrashRecord]) -> Result<TrainingMetrics, AnalyticsError> {
        let required = self.config.min_training_records.max(2);
        if records.len() < required {
            return Err(AnalyticsError::InsufficientData {
                what: "risk model training",
                required,
                found: records.len(),
            });
        }
        log::info!("Training risk model on {} records", records.len());

        let mut features = Vec::with_capacity(records.len());
        for record in records {
            let row = engineer(&FeatureInput::from(record));
            let bad = row.non_finite();
            if !bad.is_empty() {
                log::warn!("Crash {} has non-finite features", record.id);
                return Err(AnalyticsError::MissingFeature { features: bad });
            }
            features.push(row.to_array().to_vec());
        }
        let severe: Vec<bool> = records.iter().map(CrashRecord::is_severe).collect();
        let scores: Vec<f64> = records
            .iter()
            .map(|r| f64::from(r.severity_score()))
            .collect();

        let scaler = StandardScaler::fit(&features)?;
        let scaled = scaler.transform(&features)?;

        let split = train_test_split(records.len(), self.config.test_fraction, self.config.seed)?;
        let rows = |idx: &[usize]| -> Vec<Vec<f64>> {
            idx.iter().map(|&i| scaled[i].clone()).collect()
        };
        let x_train = rows(&split.train);
        let x_test = rows(&split.test);
        let severe_train: Vec<bool> = split.train.iter().map(|&i| severe[i]).collect();
        let severe_test: Vec<bool> = split.test.iter().map(|&i| severe[i]).collect();
        let score_train: Vec<f64> = split.train.iter().map(|&i| scores[i]).collect();
        let score_test: Vec<f64> = split.test.iter().map(|&i| scores[i]).collect();

        log::info!(
            "Split {} train / {} test records",
            split.train.len(),
            split.test.len()
        );

        let classifier =
            RandomForestClassifier::fit(&x_train, &severe_train, self.config.forest_params())?;
        let regressor =
            GradientBoostingRegressor::fit(&x_train, &score_train, self.config.boosting_params())?;

        let predicted_severe = x_test
            .iter()
            .map(|row| classifier.predict(row))
            .collect::<Result<Vec<_>, _>>()?;
        let predicted_scores = x_test
            .iter()
            .map(|row| regressor.predict(row))
            .collect::<Result<Vec<_>, _>>()?;

        let metrics = TrainingMetrics {
            severity_accuracy: accuracy(&predicted_severe, &severe_test),
            count_rmse: rmse(&predicted_scores, &score_test),
            train_size: split.train.len(),
            test_size: split.test.len(),
        };

        let bundle = RiskBundle {
            classifier,
            regressor,
            scaler,
        };
        save_bundle(self.store.as_ref(), RISK_ARTIFACT, &bundle)?;
        self.replace_bundle(bundle);

        log::info!(
            "Risk model trained: accuracy {:.3}, RMSE {:.3}",
            metrics.severity_accuracy,
            metrics.count_rmse
        );

        Ok(metrics)
    }

    /// Loads the persisted bundle into memory.
    ///
    /// Returns `false` when nothing has been persisted or when the persisted
    /// bundle is unusable (undecodable, missing a part, or with parts that
    /// disagree on the feature count). The resident model is left untouched
    /// in those cases.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Artifact`] if the store itself cannot be
    /// read.
    pub fn load(&self) -> Result<bool, AnalyticsError> {
        let bundle = match load_bundle::<RiskBundle>(self.store.as_ref(), RISK_ARTIFACT) {
            Ok(Some(bundle)) => bundle,
            Ok(None) => return Ok(false),
            Err(ArtifactError::Decode { name, source }) => {
                log::warn!("Ignoring unreadable {name}: {source}");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if !bundle.is_consistent() {
            log::warn!("Persisted risk bundle does not match the feature layout");
            return Ok(false);
        }
        log::info!("Loaded risk model");
        self.replace_bundle(bundle);
        Ok(true)
    }

    fn resident_or_load(&self) -> Result<Arc<RiskBundle>, AnalyticsError> {
        if let Some(bundle) = self.bundle() {
            return Ok(bundle);
        }
        log::info!("No resident risk model, loading from store");
        if self.load()? {
            self.bundle()
                .ok_or(AnalyticsError::ModelNotTrained { model: "risk" })
        } else {
            Err(AnalyticsError::ModelNotTrained { model: "risk" })
        }
    }

    /// Estimates crash risk at a point.
    ///
    /// Omitted weather/road codes default to `"1"`, an omitted timestamp to
    /// `now`.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InvalidInput`] for an unparsable timestamp or
    ///   out-of-range coordinates
    /// * [`AnalyticsError::MissingFeature`] for non-finite features
    /// * [`AnalyticsError::ModelNotTrained`] if no complete bundle is
    ///   resident or persisted
    pub fn predict(
        &self,
        query: &RiskQuery,
        now: NaiveDateTime,
    ) -> Result<RiskEstimate, AnalyticsError> {
        let weather = query.weather.as_deref().unwrap_or(DEFAULT_CODE);
        let road_condition = query.road_condition.as_deref().unwrap_or(DEFAULT_CODE);
        let timestamp = match query.timestamp.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };

        let input = FeatureInput::at(
            timestamp,
            weather,
            road_condition,
            query.longitude,
            query.latitude,
        );
        let features = engineer(&input);
        let bad = features.non_finite();
        if !bad.is_empty() {
            return Err(AnalyticsError::MissingFeature { features: bad });
        }
        if !(-90.0..=90.0).contains(&query.latitude) || !(-180.0..=180.0).contains(&query.longitude)
        {
            return Err(AnalyticsError::InvalidInput {
                message: format!(
                    "coordinates ({}, {}) are out of range",
                    query.latitude, query.longitude
                ),
            });
        }

        let bundle = self.resident_or_load()?;
        let scaled = bundle.scaler.transform_row(&features.to_array())?;
        let bad = non_finite_names(&scaled);
        if !bad.is_empty() {
            return Err(AnalyticsError::MissingFeature { features: bad });
        }

        let probability = bundle.classifier.predict_proba(&scaled)?;
        let expected_score = bundle.regressor.predict(&scaled)?.max(0.0);

        log::debug!(
            "Risk at ({}, {}) {timestamp}: p={probability:.3}, score={expected_score:.3}",
            query.latitude,
            query.longitude
        );

        Ok(RiskEstimate {
            severe_crash_probability: probability,
            expected_severity_score: expected_score,
            risk_level: RiskLevel::from_probability(probability),
            features_used: FeaturesUsed {
                time: input.hour,
                weather_risk: features.weather_risk,
                road_risk: features.road_risk,
                is_weekend: input.is_weekend,
                month: input.month,
            },
        })
    }
}
