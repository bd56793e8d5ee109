//! Inference over the deployed registry
//!
//! Encodes a raw observation with each target's own feature list, scales it
//! with the scaler the model was fitted behind, and clamps the output to the
//! target's physical range. Targets without a deployed model yield no value
//! rather than an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::features::FeatureEncoder;
use crate::model::ModelRegistry;
use crate::{Observation, Result, Target};

/// Half-width of the temperature confidence interval, in °C. A fixed
/// placeholder tied to historical validation RMSE rather than a per-model
/// estimate.
pub const TEMPERATURE_BAND: f64 = 2.0;

/// Temperature prediction with its interval and the features it consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureForecast {
    pub value: f64,
    /// `[value - band, value + band]`
    pub confidence_interval: [f64; 2],
    pub features_used: Vec<String>,
}

/// Combined response for one observation. Absent targets are omitted from
/// the serialized form entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
}

/// Serves predictions from an in-memory registry snapshot.
pub struct Predictor {
    registry: ModelRegistry,
}

impl Predictor {
    pub fn new(registry: ModelRegistry) -> Self {
        Predictor { registry }
    }

    /// Load the deployed registry from the model directory. A directory with
    /// no artifacts yields a predictor that answers `None` for every target.
    pub fn load(model_dir: &Path) -> Result<Self> {
        Ok(Predictor {
            registry: ModelRegistry::load(model_dir)?,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Predict one target. `None` when no model is deployed for it.
    pub fn predict(&self, target: Target, observation: &Observation) -> Result<Option<f64>> {
        let Some(model) = self.registry.get(target) else {
            return Ok(None);
        };

        let vector = FeatureEncoder::encode(observation, &model.features);
        let scaled = model.scaler.transform_row(&vector)?;
        let raw = model.regressor.predict(&scaled)?;
        Ok(Some(target.clamp(raw)))
    }

    /// Predict every deployed target for one observation.
    pub fn predict_all(&self, observation: &Observation) -> Result<Forecast> {
        let temperature = self
            .predict(Target::Temperature, observation)?
            .map(|value| TemperatureForecast {
                value,
                confidence_interval: [value - TEMPERATURE_BAND, value + TEMPERATURE_BAND],
                features_used: self
                    .registry
                    .get(Target::Temperature)
                    .map(|model| model.features.clone())
                    .unwrap_or_default(),
            });

        Ok(Forecast {
            model_version: self.registry.model_version.clone(),
            temperature,
            humidity: self.predict(Target::Humidity, observation)?,
            precipitation: self.predict(Target::Precipitation, observation)?,
        })
    }
}
