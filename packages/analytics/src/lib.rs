#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash hotspot detection and point-risk prediction.
//!
//! Historical crash records flow through two independent pipelines:
//!
//! * **Hotspots**: spatial clustering plus an hour-of-day weighting,
//!   persisted as one bundle and re-scored against a prediction window on
//!   demand ([`HotspotModel`]).
//! * **Point risk**: engineered features feed a severity classifier and a
//!   severity-score regressor, persisted together with the feature scaler
//!   ([`RiskModel`]).
//!
//! [`CrashRiskEngine`] owns one of each and exposes the operations callers
//! use. Persisted bundles go through an [`ArtifactStore`]; crash history is
//! read through a [`CrashSource`].

pub mod config;
pub mod engine;
pub mod features;
pub mod hotspot;
pub mod risk;
pub mod source;
pub mod store;
pub mod temporal;

pub use config::{AnalyticsConfig, ClusteringConfig, RiskConfig};
pub use engine::CrashRiskEngine;
pub use hotspot::{HOTSPOT_ARTIFACT, HotspotModel, HotspotState};
pub use risk::{RISK_ARTIFACT, RiskBundle, RiskModel};
pub use source::{CrashSource, SourceError, TimeRange, VecCrashSource};
pub use store::{ArtifactError, ArtifactStore, FileArtifactStore, MemoryArtifactStore};

use crash_risk_ml::MlError;
use crash_risk_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur during training or prediction.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Fewer records or points than the operation needs.
    #[error("Insufficient data for {what}: need at least {required}, got {found}")]
    InsufficientData {
        /// What was being computed.
        what: &'static str,
        /// Minimum number of inputs.
        required: usize,
        /// Inputs supplied.
        found: usize,
    },

    /// Prediction or load requested with no resident or persisted model.
    #[error("The {model} model has not been trained")]
    ModelNotTrained {
        /// Which model.
        model: &'static str,
    },

    /// The engineered feature vector had NaN or infinite values.
    #[error("Non-finite features: {}", features.join(", "))]
    MissingFeature {
        /// Names of the offending features.
        features: Vec<&'static str>,
    },

    /// Malformed timestamp, coordinate, or parameter.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Reading or writing a model artifact failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The crash data source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Model fitting failed.
    #[error("Model error: {0}")]
    Ml(#[from] MlError),
}

impl From<SpatialError> for AnalyticsError {
    fn from(e: SpatialError) -> Self {
        match e {
            SpatialError::InsufficientData { required, found } => Self::InsufficientData {
                what: "spatial clustering",
                required,
                found,
            },
            SpatialError::InvalidCoordinate { index } => Self::InvalidInput {
                message: format!("crash #{index} has a non-finite coordinate"),
            },
            SpatialError::InvalidConfig { message } => Self::Config { message },
            SpatialError::Scaling(e) => Self::Ml(e),
        }
    }
}
