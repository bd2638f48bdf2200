#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Small, deterministic machine-learning toolkit for the crash risk models.
//!
//! Everything here is seeded and free of global state: fitting the same
//! data with the same parameters always produces the same model. Models
//! are plain `serde` types so they can be persisted as artifact bundles.
//!
//! * [`StandardScaler`]: per-feature zero-mean/unit-variance scaling.
//! * [`RegressionTree`]: weighted CART tree (squared-error criterion).
//! * [`RandomForestClassifier`]: bagged binary classifier with optional
//!   balanced class weighting.
//! * [`GradientBoostingRegressor`]: least-squares boosted trees.
//! * [`train_test_split`], [`accuracy`], [`rmse`]: evaluation helpers.

pub mod boosting;
pub mod forest;
pub mod rng;
pub mod scaler;
pub mod split;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoostingRegressor};
pub use forest::{ForestParams, RandomForestClassifier};
pub use rng::Pcg32;
pub use scaler::StandardScaler;
pub use split::{TrainTestSplit, accuracy, rmse, train_test_split};
pub use tree::{RegressionTree, TreeParams};

use thiserror::Error;

/// Errors raised while fitting or applying a model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MlError {
    /// No rows were supplied.
    #[error("Cannot fit {what} on an empty dataset")]
    EmptyInput {
        /// What was being fitted.
        what: &'static str,
    },

    /// Fewer rows than the operation needs.
    #[error("Not enough samples: need at least {required}, got {found}")]
    NotEnoughSamples {
        /// Minimum number of rows.
        required: usize,
        /// Rows supplied.
        found: usize,
    },

    /// A row had the wrong number of features.
    #[error("Expected {expected} features, got {found}")]
    DimensionMismatch {
        /// Width the model was fitted with.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// Feature matrix and target vector lengths differ.
    #[error("Feature matrix has {rows} rows but target has {targets} values")]
    LengthMismatch {
        /// Number of feature rows.
        rows: usize,
        /// Number of targets.
        targets: usize,
    },

    /// A hyperparameter is out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what went wrong.
        message: String,
    },
}

/// Checks that `x` is non-empty, rectangular, and matches `y` in length.
///
/// Returns the feature width.
pub(crate) fn check_matrix(
    x: &[Vec<f64>],
    targets: usize,
    what: &'static str,
) -> Result<usize, MlError> {
    let Some(first) = x.first() else {
        return Err(MlError::EmptyInput { what });
    };
    if x.len() != targets {
        return Err(MlError::LengthMismatch {
            rows: x.len(),
            targets,
        });
    }
    let width = first.len();
    if let Some(row) = x.iter().find(|row| row.len() != width) {
        return Err(MlError::DimensionMismatch {
            expected: width,
            found: row.len(),
        });
    }
    Ok(width)
}
