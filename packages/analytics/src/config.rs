//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```toml
//! [clustering]
//! eps = 0.01
//! min_samples = 3
//! include_estimated_locations = false
//!
//! [risk]
//! n_estimators = 100
//! max_depth = 10
//! boosting_estimators = 100
//! boosting_max_depth = 5
//! learning_rate = 0.1
//! test_fraction = 0.2
//! seed = 42
//! min_training_records = 10
//!
//! [location]
//! fallback_latitude = 40.9147
//! fallback_longitude = -77.8476
//!
//! [location.bbox]
//! west = -81.0
//! south = 39.0
//! east = -74.0
//! north = 43.0
//! ```

use std::path::Path;

use crash_risk_crash_models::LocationBounds;
use crash_risk_ml::{BoostingParams, ForestParams};
use crash_risk_spatial::ClusterConfig;
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Hotspot clustering.
    pub clustering: ClusteringConfig,
    /// Risk model training.
    pub risk: RiskConfig,
    /// Coordinate sanity box and estimated-location fallback.
    pub location: LocationBounds,
}

impl AnalyticsConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Config`] if the document is not valid TOML
    /// or has values of the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, AnalyticsError> {
        toml::from_str(content).map_err(|e| AnalyticsError::Config {
            message: format!("Failed to parse config: {e}"),
        })
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Config`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Self, AnalyticsError> {
        let content = std::fs::read_to_string(path).map_err(|e| AnalyticsError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Hotspot clustering parameters.
///
/// `eps` is in standardized coordinate units and must be re-tuned per
/// deployment region; see [`ClusterConfig::eps_for_radius_km`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// DBSCAN neighborhood radius (standardized units).
    pub eps: f64,
    /// DBSCAN minimum neighborhood size.
    pub min_samples: usize,
    /// Cluster records whose coordinates are the estimated fallback point.
    pub include_estimated_locations: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        let cluster = ClusterConfig::default();
        Self {
            eps: cluster.eps,
            min_samples: cluster.min_samples,
            include_estimated_locations: false,
        }
    }
}

impl ClusteringConfig {
    /// The DBSCAN parameters.
    #[must_use]
    pub const fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            eps: self.eps,
            min_samples: self.min_samples,
        }
    }
}

/// Risk model training parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Trees in the severity classifier.
    pub n_estimators: usize,
    /// Depth limit of classifier trees.
    pub max_depth: usize,
    /// Boosting stages in the severity-score regressor.
    pub boosting_estimators: usize,
    /// Depth limit of regressor trees.
    pub boosting_max_depth: usize,
    /// Regressor shrinkage.
    pub learning_rate: f64,
    /// Fraction of records held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split and both models.
    pub seed: u64,
    /// Training is refused below this many records.
    pub min_training_records: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            boosting_estimators: 100,
            boosting_max_depth: 5,
            learning_rate: 0.1,
            test_fraction: 0.2,
            seed: 42,
            min_training_records: 10,
        }
    }
}

impl RiskConfig {
    /// Classifier hyperparameters (always class-balanced).
    #[must_use]
    pub const fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            balanced: true,
            seed: self.seed,
        }
    }

    /// Regressor hyperparameters.
    #[must_use]
    pub const fn boosting_params(&self) -> BoostingParams {
        BoostingParams {
            n_estimators: self.boosting_estimators,
            learning_rate: self.learning_rate,
            max_depth: self.boosting_max_depth,
            seed: self.seed,
        }
    }
}
