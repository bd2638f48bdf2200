//! Train/test splitting and evaluation metrics.

use crate::{MlError, Pcg32};

/// Row indices assigned to each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    /// Rows used for fitting.
    pub train: Vec<usize>,
    /// Held-out rows used for evaluation.
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with a fixed seed and holds out `ceil(n * test_fraction)`
/// rows (at least one, leaving at least one for training).
///
/// # Errors
///
/// * [`MlError::NotEnoughSamples`] if `n < 2`
/// * [`MlError::InvalidParameter`] if `test_fraction` is not in `(0, 1)`
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit, MlError> {
    if n < 2 {
        return Err(MlError::NotEnoughSamples {
            required: 2,
            found: n,
        });
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(MlError::InvalidParameter {
            message: format!("test_fraction must be in (0, 1), got {test_fraction}"),
        });
    }

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    Pcg32::new(seed).shuffle(&mut order);
    let train = order.split_off(n_test);

    Ok(TrainTestSplit { train, test: order })
}

/// Fraction of predictions that match. Empty input scores `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(predicted: &[bool], actual: &[bool]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let correct = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    correct as f64 / n as f64
}

/// Root mean squared error. Empty input scores `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}
