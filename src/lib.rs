//! Short-term weather forecasting from hourly observations
//!
//! Per-target linear models trained offline with time-respecting validation,
//! promoted behind metric thresholds, and served with graceful degradation
//! when some targets have no deployed model.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::training::evaluate::Thresholds;

/// Version tag carried by every artifact and prediction response.
pub const MODEL_VERSION: &str = "v2.0-timeseries";

/// A predictable weather variable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Temperature,
    Humidity,
    Precipitation,
}

impl Target {
    /// Training order. Temperature is mandatory; the rest are optional.
    pub const ALL: [Target; 3] = [
        Target::Temperature,
        Target::Humidity,
        Target::Precipitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Temperature => "temperature",
            Target::Humidity => "humidity",
            Target::Precipitation => "precipitation",
        }
    }

    /// Measurement unit, for display only.
    pub fn unit(&self) -> &'static str {
        match self {
            Target::Temperature => "°C",
            Target::Humidity => "%",
            Target::Precipitation => "mm",
        }
    }

    /// Feature list the reference models were selected on.
    pub fn declared_features(&self) -> &'static [&'static str] {
        match self {
            Target::Temperature => &["pressure_msl", "radiation", "wind_y"],
            Target::Humidity => &["radiation", "w_51", "w_53", "w_61", "w_63"],
            Target::Precipitation => &["w_63", "w_65", "w_61"],
        }
    }

    /// Clamp a raw regressor output to the target's physical range.
    ///
    /// Applied at inference only; training sees the unconstrained values.
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            Target::Temperature => value,
            Target::Humidity => value.clamp(0.0, 100.0),
            Target::Precipitation => value.max(0.0),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw, provider-shaped observation: named numeric fields, possibly
/// incomplete. Unknown fields are carried along and ignored by the encoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    fields: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.fields.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Observation {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Contract violation: a vector reached a scaler or regressor fitted
    /// for a different dimensionality. Surfaced, never silently absorbed.
    #[error("Feature vector has {got} values, model expects {expected}")]
    FeatureDimension { expected: usize, got: usize },

    #[error("Required column missing from training data: {0}")]
    MissingColumn(String),

    #[error("Training failed: {0}")]
    Training(String),
}

pub type Result<T> = std::result::Result<T, WeatherError>;

/// Application configuration loaded from nimbus.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub thresholds: Thresholds,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Leading fraction of the time-ordered table used for training.
    pub train_fraction: f64,
    pub cv_folds: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub observations_path: String,
    pub model_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 500,
                learning_rate: 0.1,
                train_fraction: 0.8,
                cv_folds: 5,
            },
            thresholds: Thresholds::default(),
            data: DataConfig {
                observations_path: "data/weather_hourly.csv".to_string(),
                model_dir: "model".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WeatherError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| WeatherError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WeatherError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
