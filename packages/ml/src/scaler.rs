//! Per-feature standardization.

use serde::{Deserialize, Serialize};

use crate::MlError;

/// Scales each feature to zero mean and unit (population) variance.
///
/// Constant features keep a scale of `1.0` so they map to `0.0` instead
/// of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Learns the per-feature mean and standard deviation.
    ///
    /// # Errors
    ///
    /// * [`MlError::EmptyInput`] if `rows` is empty
    /// * [`MlError::DimensionMismatch`] if rows differ in width
    #[allow(clippy::cast_precision_loss)]
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, MlError> {
        let Some(first) = rows.first() else {
            return Err(MlError::EmptyInput {
                what: "standard scaler",
            });
        };
        let width = first.as_ref().len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(MlError::DimensionMismatch {
                    expected: width,
                    found: row.len(),
                });
            }
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row.as_ref()).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON { std } else { 1.0 }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    /// Number of features the scaler was fitted on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Fitted per-feature means.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Fitted per-feature standard deviations.
    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Standardizes one row.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::DimensionMismatch`] if the row width differs from
    /// the fitted width.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, MlError> {
        if row.len() != self.n_features() {
            return Err(MlError::DimensionMismatch {
                expected: self.n_features(),
                found: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardizes every row.
    ///
    /// # Errors
    ///
    /// Returns [`MlError::DimensionMismatch`] if any row width differs from
    /// the fitted width.
    pub fn transform<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Vec<f64>>, MlError> {
        rows.iter()
            .map(|row| self.transform_row(row.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_to_zero_mean_unit_variance() {
        let rows = vec![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows).unwrap();

        for col in 0..2 {
            let mean: f64 = scaled.iter().map(|r| r[col]).sum::<f64>() / 4.0;
            let var: f64 = scaled.iter().map(|r| r[col].powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12, "column {col} mean {mean}");
            assert!((var - 1.0).abs() < 1e-12, "column {col} variance {var}");
        }
    }

    #[test]
    fn constant_feature_keeps_unit_scale() {
        let rows = vec![[5.0, 1.0], [5.0, 2.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert!((scaler.scale()[0] - 1.0).abs() < f64::EPSILON);
        assert_eq!(scaler.transform_row(&[5.0, 1.5]).unwrap()[0], 0.0);
    }

    #[test]
    fn rejects_empty_and_ragged_input() {
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(matches!(
            StandardScaler::fit(&empty),
            Err(MlError::EmptyInput { .. })
        ));

        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            StandardScaler::fit(&ragged),
            Err(MlError::DimensionMismatch { .. })
        ));

        let scaler = StandardScaler::fit(&[[1.0, 2.0]]).unwrap();
        assert!(scaler.transform_row(&[1.0, 2.0, 3.0]).is_err());
    }
}
