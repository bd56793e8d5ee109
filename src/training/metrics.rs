//! Regression metrics and the training-run snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::model::registry::write_atomic;
use crate::{Result, Target, MODEL_VERSION};

/// Deployed metrics snapshot, compared against by the next evaluation.
pub const RESULTS_FILE: &str = "training_results.json";
/// Candidate snapshot written by training, pending promotion.
pub const CANDIDATE_RESULTS_FILE: &str = "candidate_results.json";
/// Snapshot displaced by the most recent promotion, kept for reference.
pub const PREVIOUS_RESULTS_FILE: &str = "training_results_previous.json";

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Coefficient of determination. A constant actual series scores 1.0 only
/// for a perfect fit, 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Held-out metrics for one fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        RegressionMetrics {
            r2: r2_score(actual, predicted),
            mae: mean_absolute_error(actual, predicted),
            rmse: root_mean_squared_error(actual, predicted),
        }
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R²: {:.4} | MAE: {:.4} | RMSE: {:.4}",
            self.r2, self.mae, self.rmse
        )
    }
}

/// Averaged expanding-window cross-validation scores. A stability
/// diagnostic, never used to pick hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub cv_mae_mean: f64,
    pub cv_rmse_mean: f64,
}

/// Held-out residuals kept in memory for diagnostics; not serialized into
/// the snapshot.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub residuals: Vec<f64>,
    pub predictions: Vec<f64>,
    pub actual: Vec<f64>,
}

/// Per-target training outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    #[serde(flatten)]
    pub metrics: RegressionMetrics,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub cv: Option<CvSummary>,
    pub features: Vec<String>,
    pub n_samples_train: usize,
    pub n_samples_test: usize,
    #[serde(skip)]
    pub diagnostics: Option<Diagnostics>,
}

/// Snapshot of one training run, serialized next to the registry manifest
/// and retained as "previous" for the next run's comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub model_version: String,
    pub training_date: DateTime<Utc>,
    pub targets: BTreeMap<Target, TargetReport>,
}

impl Default for TrainingRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingRun {
    pub fn new() -> Self {
        TrainingRun {
            model_version: MODEL_VERSION.to_string(),
            training_date: Utc::now(),
            targets: BTreeMap::new(),
        }
    }

    pub fn target(&self, target: Target) -> Option<&TargetReport> {
        self.targets.get(&target)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_scores_one() {
        let actual = [1.0, 2.0, 3.0];
        assert_eq!(r2_score(&actual, &actual), 1.0);
        assert_eq!(mean_absolute_error(&actual, &actual), 0.0);
        assert_eq!(root_mean_squared_error(&actual, &actual), 0.0);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.5, 2.0, 2.5, 4.0];
        assert!((mean_absolute_error(&actual, &predicted) - 0.25).abs() < 1e-12);
        let expected_rmse = (0.5f64 / 4.0).sqrt();
        assert!((root_mean_squared_error(&actual, &predicted) - expected_rmse).abs() < 1e-12);
        // ss_res = 0.5, ss_tot = 5.0
        assert!((r2_score(&actual, &predicted) - 0.9).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn mismatched_series_lengths_are_a_visible_failure() {
        mean_absolute_error(&[1.0, 2.0], &[1.0]);
    }

    #[test]
    fn predicting_the_mean_scores_zero() {
        let actual = [2.0, 4.0, 6.0];
        let predicted = [4.0, 4.0, 4.0];
        assert!(r2_score(&actual, &predicted).abs() < 1e-12);
    }

    #[test]
    fn snapshot_round_trips_without_diagnostics() {
        let mut run = TrainingRun::new();
        run.targets.insert(
            Target::Temperature,
            TargetReport {
                metrics: RegressionMetrics {
                    r2: 0.82,
                    mae: 1.2,
                    rmse: 1.8,
                },
                cv: Some(CvSummary {
                    cv_mae_mean: 1.3,
                    cv_rmse_mean: 1.9,
                }),
                features: vec!["pressure_msl".to_string(), "wind_y".to_string()],
                n_samples_train: 800,
                n_samples_test: 200,
                diagnostics: Some(Diagnostics {
                    residuals: vec![0.1, -0.2],
                    predictions: vec![20.0, 21.0],
                    actual: vec![20.1, 20.8],
                }),
            },
        );
        run.targets.insert(
            Target::Humidity,
            TargetReport {
                metrics: RegressionMetrics {
                    r2: 0.7,
                    mae: 5.0,
                    rmse: 7.0,
                },
                cv: None,
                features: vec!["radiation".to_string()],
                n_samples_train: 800,
                n_samples_test: 200,
                diagnostics: None,
            },
        );

        let json = serde_json::to_string(&run).unwrap();
        // Diagnostics stay in memory only.
        assert!(!json.contains("residuals"));
        assert!(json.contains("cv_mae_mean"));

        let back: TrainingRun = serde_json::from_str(&json).unwrap();
        let temperature = back.target(Target::Temperature).unwrap();
        assert_eq!(temperature.metrics.r2, 0.82);
        assert!(temperature.cv.is_some());
        assert!(temperature.diagnostics.is_none());
        let humidity = back.target(Target::Humidity).unwrap();
        assert!(humidity.cv.is_none());
    }
}
