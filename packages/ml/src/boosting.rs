//! Least-squares gradient boosting.

use serde::{Deserialize, Serialize};

use crate::{MlError, Pcg32, RegressionTree, TreeParams, check_matrix};

/// Hyperparameters for [`GradientBoostingRegressor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting stages.
    pub n_estimators: usize,
    /// Shrinkage applied to each stage.
    pub learning_rate: f64,
    /// Maximum depth of each stage's tree.
    pub max_depth: usize,
    /// Seed for the tree builder. Stages consider every feature, so this
    /// only matters if feature sampling is ever enabled.
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            seed: 42,
        }
    }
}

/// Additive model `init + lr * sum(tree_k(x))`, each tree fitted to the
/// residuals of the stages before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    /// Fits the model.
    ///
    /// # Errors
    ///
    /// * [`MlError::EmptyInput`] / [`MlError::LengthMismatch`] /
    ///   [`MlError::DimensionMismatch`] for malformed input
    /// * [`MlError::InvalidParameter`] for a non-positive learning rate or a
    ///   zero depth
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: BoostingParams) -> Result<Self, MlError> {
        let n_features = check_matrix(x, y.len(), "gradient boosting")?;
        if !(params.learning_rate > 0.0) || params.max_depth == 0 {
            return Err(MlError::InvalidParameter {
                message: format!(
                    "learning_rate must be positive and max_depth at least 1 (got {} / {})",
                    params.learning_rate, params.max_depth
                ),
            });
        }

        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut predictions = vec![init; y.len()];
        let weights = vec![1.0; y.len()];
        let sample: Vec<usize> = (0..y.len()).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = Pcg32::new(params.seed);

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
            let tree = RegressionTree::fit(x, &residuals, &weights, &sample, tree_params, &mut rng);
            for (p, row) in predictions.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        log::debug!(
            "Fitted gradient boosting: {} stages over {} samples",
            trees.len(),
            y.len()
        );

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
            n_features,
        })
    }

    /// Number of features the model expects.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Predicts the target for one row.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::DimensionMismatch`] for a row of the wrong width.
    pub fn predict(&self, row: &[f64]) -> Result<f64, MlError> {
        if row.len() != self.n_features {
            return Err(MlError::DimensionMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        Ok(self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_nonlinear_curve() {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i) / 10.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| (r[0] * 2.0).sin() * 3.0).collect();
        let model = GradientBoostingRegressor::fit(&x, &y, BoostingParams::default()).unwrap();

        let mse: f64 = x
            .iter()
            .zip(&y)
            .map(|(r, t)| (model.predict(r).unwrap() - t).powi(2))
            .sum::<f64>()
            / 50.0;
        assert!(mse < 0.05, "training MSE {mse} too high");
    }

    #[test]
    fn zero_stages_predicts_the_mean() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![2.0, 4.0];
        let params = BoostingParams {
            n_estimators: 0,
            ..BoostingParams::default()
        };
        let model = GradientBoostingRegressor::fit(&x, &y, params).unwrap();
        assert!((model.predict(&[0.0]).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_learning_rate() {
        let params = BoostingParams {
            learning_rate: 0.0,
            ..BoostingParams::default()
        };
        assert!(matches!(
            GradientBoostingRegressor::fit(&[vec![1.0]], &[1.0], params),
            Err(MlError::InvalidParameter { .. })
        ));
    }
}
