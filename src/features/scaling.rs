//! Per-feature standardization

use serde::{Deserialize, Serialize};

use crate::{Result, WeatherError};

/// Z-score scaler: subtract mean, divide by standard deviation.
///
/// Fit once on the training partition, then applied unchanged at test time
/// and at inference, so no future distribution statistics leak backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and scales from a row-major matrix.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        if n == 0 || dim == 0 {
            return Err(WeatherError::Training(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mut mean = vec![0.0; dim];
        for row in rows {
            if row.len() != dim {
                return Err(WeatherError::FeatureDimension {
                    expected: dim,
                    got: row.len(),
                });
            }
            for (acc, value) in mean.iter_mut().zip(row) {
                *acc += value;
            }
        }
        for acc in &mut mean {
            *acc /= n as f64;
        }

        let mut variance = vec![0.0; dim];
        for row in rows {
            for ((acc, value), m) in variance.iter_mut().zip(row).zip(&mean) {
                let centered = value - m;
                *acc += centered * centered;
            }
        }
        // Constant columns scale by 1 so they standardize to zero.
        let scale = variance
            .iter()
            .map(|v| {
                let std = (v / n as f64).sqrt();
                if std > 0.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(StandardScaler { mean, scale })
    }

    /// Fitted dimensionality.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Standardize a single vector. A length mismatch is a contract
    /// violation, not a recoverable condition.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dim() {
            return Err(WeatherError::FeatureDimension {
                expected: self.dim(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }

    /// Standardize a row-major matrix.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Map a standardized vector back to the original feature space.
    pub fn inverse_transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dim() {
            return Err(WeatherError::FeatureDimension {
                expected: self.dim(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| value * scale + mean)
            .collect())
    }

    /// Identity scaler for a given dimensionality.
    pub fn identity(dim: usize) -> Self {
        StandardScaler {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }
}
