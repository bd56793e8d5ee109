//! Linear regressor parameters

use serde::{Deserialize, Serialize};

use crate::{Result, WeatherError};

/// Ordinary linear form over a standardized feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        LinearRegressor { weights, intercept }
    }

    /// Point estimate for one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(WeatherError::FeatureDimension {
                expected: self.weights.len(),
                got: features.len(),
            });
        }
        Ok(self
            .weights
            .iter()
            .zip(features)
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.intercept)
    }
}

/// Tagged regressor union so the persisted manifest names its kind and can
/// be deserialized without reconstructing any runtime objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regressor {
    Linear(LinearRegressor),
}

impl Regressor {
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        match self {
            Regressor::Linear(model) => model.predict(features),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Linear(_) => "linear",
        }
    }
}
