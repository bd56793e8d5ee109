//! Model registry manifest
//!
//! One JSON artifact per training run, mapping target name to regressor
//! parameters, scaler state and the ordered feature list. The registry is
//! loaded once and treated as read-only; promotion swaps the whole file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::features::StandardScaler;
use crate::model::Regressor;
use crate::{Result, Target, WeatherError, MODEL_VERSION};

/// Deployed registry manifest.
pub const REGISTRY_FILE: &str = "registry.json";
/// Candidate manifest written by training, pending promotion.
pub const CANDIDATE_REGISTRY_FILE: &str = "candidate_registry.json";
/// Legacy single-target artifact accepted as a fallback.
pub const LEGACY_TEMPERATURE_FILE: &str = "temperature_model.json";

/// Everything needed to serve one target: regressor, the scaler it was
/// fitted behind, and the exact feature order both expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetModel {
    pub regressor: Regressor,
    pub scaler: StandardScaler,
    pub features: Vec<String>,
}

/// Target name → model. May hold any subset of targets; absence is a
/// normal state callers branch on, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistry {
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    pub targets: BTreeMap<Target, TargetModel>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry {
            model_version: MODEL_VERSION.to_string(),
            trained_at: Utc::now(),
            targets: BTreeMap::new(),
        }
    }

    pub fn get(&self, target: Target) -> Option<&TargetModel> {
        self.targets.get(&target)
    }

    pub fn insert(&mut self, target: Target, model: TargetModel) {
        self.targets.insert(target, model);
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.targets.keys().copied()
    }

    /// Load the deployed registry from the model directory.
    ///
    /// A missing manifest degrades to an empty registry (serving continues
    /// without predictions); a present-but-unreadable manifest is an error.
    /// A legacy single-target artifact is accepted as a temperature-only
    /// fallback.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let manifest = model_dir.join(REGISTRY_FILE);
        if manifest.exists() {
            return Self::load_from(&manifest);
        }

        let legacy = model_dir.join(LEGACY_TEMPERATURE_FILE);
        if legacy.exists() {
            log::info!("loading legacy temperature-only artifact from {}", legacy.display());
            let content = std::fs::read_to_string(&legacy)?;
            let model: TargetModel = serde_json::from_str(&content)?;
            let mut registry = ModelRegistry::new();
            registry.insert(Target::Temperature, model);
            return Ok(registry);
        }

        log::warn!(
            "no model artifacts in {}, predictions unavailable until a model is promoted",
            model_dir.display()
        );
        Ok(ModelRegistry::new())
    }

    /// Load a specific manifest file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            WeatherError::Config(format!(
                "registry manifest {} is unreadable: {}",
                path.display(),
                e
            ))
        })
    }

    /// Persist the manifest. Atomic so a concurrent reader never observes a
    /// partially written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
    }
}

/// Write to a sibling temp file, then rename into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearRegressor;
    use std::fs;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nimbus-registry-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_model(dim: usize) -> TargetModel {
        TargetModel {
            regressor: Regressor::Linear(LinearRegressor::new(vec![1.0; dim], 0.0)),
            scaler: StandardScaler::identity(dim),
            features: (0..dim).map(|i| format!("f{}", i)).collect(),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = test_dir("roundtrip");
        let mut registry = ModelRegistry::new();
        registry.insert(Target::Temperature, sample_model(3));
        registry.insert(Target::Precipitation, sample_model(2));
        registry.save(&dir.join(REGISTRY_FILE)).unwrap();

        let loaded = ModelRegistry::load(&dir).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded.model_version, MODEL_VERSION);
        assert_eq!(
            loaded.targets().collect::<Vec<_>>(),
            vec![Target::Temperature, Target::Precipitation]
        );
        assert!(loaded.get(Target::Humidity).is_none());
        assert_eq!(loaded.get(Target::Temperature).unwrap().features.len(), 3);
    }

    #[test]
    fn missing_artifacts_degrade_to_empty_registry() {
        let dir = test_dir("empty");
        let registry = ModelRegistry::load(&dir).unwrap();
        fs::remove_dir_all(&dir).ok();
        assert!(registry.is_empty());
    }

    #[test]
    fn legacy_single_target_artifact_is_accepted() {
        let dir = test_dir("legacy");
        let model = sample_model(3);
        fs::write(
            dir.join(LEGACY_TEMPERATURE_FILE),
            serde_json::to_vec(&model).unwrap(),
        )
        .unwrap();

        let registry = ModelRegistry::load(&dir).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(registry.targets().collect::<Vec<_>>(), vec![Target::Temperature]);
        assert_eq!(registry.get(Target::Temperature), Some(&model));
    }

    #[test]
    fn corrupt_manifest_is_an_error_not_a_fallback() {
        let dir = test_dir("corrupt");
        fs::write(dir.join(REGISTRY_FILE), b"{not json").unwrap();
        let result = ModelRegistry::load(&dir);
        fs::remove_dir_all(&dir).ok();
        assert!(result.is_err());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = test_dir("atomic");
        let path = dir.join(REGISTRY_FILE);
        ModelRegistry::new().save(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
