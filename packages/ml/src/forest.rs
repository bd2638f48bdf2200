//! Random-forest binary classifier.

use serde::{Deserialize, Serialize};

use crate::{MlError, Pcg32, RegressionTree, TreeParams, check_matrix};

/// Hyperparameters for [`RandomForestClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bootstrapped trees.
    pub n_estimators: usize,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Reweight classes inversely to their frequency.
    pub balanced: bool,
    /// Seed for bootstrap and feature sampling.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            balanced: true,
            seed: 42,
        }
    }
}

/// Bagged ensemble of weighted trees over `0`/`1` targets.
///
/// Each tree samples `floor(sqrt(n_features))` candidate features per node.
/// The positive-class probability is the mean leaf value across trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

/// Per-sample weights that equalize the total weight of each class present.
///
/// Mirrors the usual `n_samples / (n_classes * class_count)` rule.
#[allow(clippy::cast_precision_loss)]
fn balanced_weights(y: &[bool]) -> Vec<f64> {
    let positives = y.iter().filter(|&&v| v).count();
    let negatives = y.len() - positives;
    let classes = usize::from(positives > 0) + usize::from(negatives > 0);
    let n = y.len() as f64;

    let weight_of = |count: usize| {
        if count == 0 {
            0.0
        } else {
            n / (classes as f64 * count as f64)
        }
    };
    let (pos_w, neg_w) = (weight_of(positives), weight_of(negatives));

    y.iter().map(|&v| if v { pos_w } else { neg_w }).collect()
}

impl RandomForestClassifier {
    /// Fits the forest.
    ///
    /// # Errors
    ///
    /// * [`MlError::EmptyInput`] / [`MlError::LengthMismatch`] /
    ///   [`MlError::DimensionMismatch`] for malformed input
    /// * [`MlError::InvalidParameter`] if `n_estimators` or `max_depth` is 0
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fit(x: &[Vec<f64>], y: &[bool], params: ForestParams) -> Result<Self, MlError> {
        let n_features = check_matrix(x, y.len(), "random forest")?;
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(MlError::InvalidParameter {
                message: "n_estimators and max_depth must be at least 1".to_string(),
            });
        }

        let targets: Vec<f64> = y.iter().map(|&v| f64::from(u8::from(v))).collect();
        let weights = if params.balanced {
            balanced_weights(y)
        } else {
            vec![1.0; y.len()]
        };
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            max_features: Some(((n_features as f64).sqrt() as usize).max(1)),
        };

        let mut rng = Pcg32::new(params.seed);
        let n = x.len();
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = rng.fork();
                let sample: Vec<usize> = (0..n).map(|_| tree_rng.next_index(n)).collect();
                RegressionTree::fit(x, &targets, &weights, &sample, tree_params, &mut tree_rng)
            })
            .collect();

        log::debug!(
            "Fitted random forest: {} trees over {n} samples, {n_features} features",
            params.n_estimators
        );

        Ok(Self { trees, n_features })
    }

    /// Number of features the forest expects.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Probability that `row` belongs to the positive class.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::DimensionMismatch`] for a row of the wrong width.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, MlError> {
        if row.len() != self.n_features {
            return Err(MlError::DimensionMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        if self.trees.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok((total / self.trees.len() as f64).clamp(0.0, 1.0))
    }

    /// Predicts the positive class when its probability exceeds one half.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::DimensionMismatch`] for a row of the wrong width.
    pub fn predict(&self, row: &[f64]) -> Result<bool, MlError> {
        Ok(self.predict_proba(row)? > 0.5)
    }
}
