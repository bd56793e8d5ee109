//! Promotion gating
//!
//! A candidate model is compared against fixed quality thresholds and
//! against the currently deployed metrics. The verdict decides whether the
//! candidate replaces the deployed artifacts; every decision is appended to
//! an audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::model::registry::{CANDIDATE_REGISTRY_FILE, REGISTRY_FILE};
use crate::training::metrics::{
    RegressionMetrics, CANDIDATE_RESULTS_FILE, PREVIOUS_RESULTS_FILE, RESULTS_FILE,
};
use crate::{Result, WeatherError};

/// Append-only log of evaluation decisions, one JSON object per line.
pub const EVALUATIONS_FILE: &str = "evaluations.jsonl";

/// Quality gate for the temperature model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum acceptable R² on the held-out partition.
    pub r2_min: f64,
    /// Maximum acceptable MAE, in the target's own unit.
    pub mae_max: f64,
    /// Largest R² regression versus the deployed model tolerated before the
    /// candidate is rejected outright.
    pub r2_drop_tolerance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            r2_min: 0.75,
            mae_max: 2.5,
            r2_drop_tolerance: 0.05,
        }
    }
}

/// Outcome of gating one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub accepted: bool,
    /// Accepted, but worse than the deployed model on some metric.
    pub caution: bool,
    pub reasons: Vec<String>,
}

impl Verdict {
    fn reject(reasons: Vec<String>) -> Self {
        Verdict {
            accepted: false,
            caution: false,
            reasons,
        }
    }

    fn accept() -> Self {
        Verdict {
            accepted: true,
            caution: false,
            reasons: Vec::new(),
        }
    }
}

/// Gate a candidate's held-out metrics.
///
/// The absolute bar applies unconditionally. With a deployed baseline, a
/// candidate that is no worse on both R² and MAE is accepted cleanly; an
/// R² drop beyond the tolerance is rejected; any other regression is
/// accepted with caution so the audit log records it.
pub fn evaluate(
    new: &RegressionMetrics,
    previous: Option<&RegressionMetrics>,
    thresholds: &Thresholds,
) -> Verdict {
    let mut failures = Vec::new();
    if new.r2 < thresholds.r2_min {
        failures.push(format!(
            "R² {:.4} below minimum {:.4}",
            new.r2, thresholds.r2_min
        ));
    }
    if new.mae > thresholds.mae_max {
        failures.push(format!(
            "MAE {:.4} above maximum {:.4}",
            new.mae, thresholds.mae_max
        ));
    }
    if !failures.is_empty() {
        return Verdict::reject(failures);
    }

    let Some(previous) = previous else {
        return Verdict::accept();
    };

    if new.r2 >= previous.r2 && new.mae <= previous.mae {
        return Verdict::accept();
    }

    let r2_drop = previous.r2 - new.r2;
    if r2_drop > thresholds.r2_drop_tolerance {
        return Verdict::reject(vec![format!(
            "R² dropped {:.4} from deployed {:.4}, tolerance is {:.4}",
            r2_drop, previous.r2, thresholds.r2_drop_tolerance
        )]);
    }

    let mut reasons = Vec::new();
    if new.r2 < previous.r2 {
        reasons.push(format!(
            "R² {:.4} below deployed {:.4}, within tolerance",
            new.r2, previous.r2
        ));
    }
    if new.mae > previous.mae {
        reasons.push(format!(
            "MAE {:.4} above deployed {:.4}",
            new.mae, previous.mae
        ));
    }
    Verdict {
        accepted: true,
        caution: true,
        reasons,
    }
}

/// Swap the candidate artifacts over the deployed ones, keeping the
/// displaced results snapshot for the next comparison's audit trail.
///
/// Both candidate files must exist before any rename runs. A half-written
/// candidate set (crash between training's two saves, manual cleanup) is
/// rejected whole so the deployed registry and its metrics snapshot never
/// come from different runs.
pub fn promote(model_dir: &Path) -> Result<()> {
    let candidate_registry = model_dir.join(CANDIDATE_REGISTRY_FILE);
    let candidate_results = model_dir.join(CANDIDATE_RESULTS_FILE);
    if !candidate_registry.exists() || !candidate_results.exists() {
        return Err(WeatherError::Config(format!(
            "incomplete candidate artifacts in {}, nothing promoted",
            model_dir.display()
        )));
    }

    let results = model_dir.join(RESULTS_FILE);
    if results.exists() {
        std::fs::rename(&results, model_dir.join(PREVIOUS_RESULTS_FILE))?;
    }
    std::fs::rename(candidate_results, &results)?;
    std::fs::rename(candidate_registry, model_dir.join(REGISTRY_FILE))?;
    Ok(())
}

/// One line in the evaluation audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluated_at: DateTime<Utc>,
    pub accepted: bool,
    pub caution: bool,
    pub reasons: Vec<String>,
    pub metrics: RegressionMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<RegressionMetrics>,
    pub thresholds: Thresholds,
}

impl EvaluationRecord {
    pub fn new(
        verdict: &Verdict,
        metrics: RegressionMetrics,
        previous: Option<RegressionMetrics>,
        thresholds: Thresholds,
    ) -> Self {
        EvaluationRecord {
            evaluated_at: Utc::now(),
            accepted: verdict.accepted,
            caution: verdict.caution,
            reasons: verdict.reasons.clone(),
            metrics,
            previous,
            thresholds,
        }
    }

    /// Append this record to the audit log in the model directory.
    pub fn append(&self, model_dir: &Path) -> Result<()> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(model_dir.join(EVALUATIONS_FILE))?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(r2: f64, mae: f64) -> RegressionMetrics {
        RegressionMetrics {
            r2,
            mae,
            rmse: mae * 1.3,
        }
    }

    #[test]
    fn first_model_passing_the_bar_is_accepted() {
        let verdict = evaluate(&metrics(0.80, 2.0), None, &Thresholds::default());
        assert!(verdict.accepted);
        assert!(!verdict.caution);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn below_the_bar_is_rejected_even_without_a_baseline() {
        let verdict = evaluate(&metrics(0.70, 2.0), None, &Thresholds::default());
        assert!(!verdict.accepted);
        assert_eq!(verdict.reasons.len(), 1);

        let verdict = evaluate(&metrics(0.80, 3.0), None, &Thresholds::default());
        assert!(!verdict.accepted);

        let verdict = evaluate(&metrics(0.70, 3.0), None, &Thresholds::default());
        assert_eq!(verdict.reasons.len(), 2);
    }

    #[test]
    fn large_regression_against_deployed_is_rejected() {
        // Passes the absolute bar but drops R² by 0.10 against deployed.
        let verdict = evaluate(
            &metrics(0.80, 2.0),
            Some(&metrics(0.90, 1.0)),
            &Thresholds::default(),
        );
        assert!(!verdict.accepted);
        assert!(verdict.reasons[0].contains("dropped"));
    }

    #[test]
    fn small_regression_is_accepted_with_caution() {
        let verdict = evaluate(
            &metrics(0.88, 1.5),
            Some(&metrics(0.90, 1.0)),
            &Thresholds::default(),
        );
        assert!(verdict.accepted);
        assert!(verdict.caution);
        assert_eq!(verdict.reasons.len(), 2);
    }

    #[test]
    fn improvement_over_deployed_is_a_clean_accept() {
        let verdict = evaluate(
            &metrics(0.92, 0.9),
            Some(&metrics(0.90, 1.0)),
            &Thresholds::default(),
        );
        assert!(verdict.accepted);
        assert!(!verdict.caution);
    }

    fn promotion_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("nimbus-promote-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn promotion_rotates_candidate_over_deployed() {
        let dir = promotion_dir("rotate");
        std::fs::write(dir.join(REGISTRY_FILE), b"old registry").unwrap();
        std::fs::write(dir.join(RESULTS_FILE), b"old results").unwrap();
        std::fs::write(dir.join(CANDIDATE_REGISTRY_FILE), b"new registry").unwrap();
        std::fs::write(dir.join(CANDIDATE_RESULTS_FILE), b"new results").unwrap();

        promote(&dir).unwrap();

        assert_eq!(std::fs::read(dir.join(REGISTRY_FILE)).unwrap(), b"new registry");
        assert_eq!(std::fs::read(dir.join(RESULTS_FILE)).unwrap(), b"new results");
        assert_eq!(
            std::fs::read(dir.join(PREVIOUS_RESULTS_FILE)).unwrap(),
            b"old results"
        );
        assert!(!dir.join(CANDIDATE_REGISTRY_FILE).exists());
        assert!(!dir.join(CANDIDATE_RESULTS_FILE).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn incomplete_candidate_leaves_deployed_artifacts_untouched() {
        // Candidate results without a candidate registry, as after a crash
        // between training's two saves.
        let dir = promotion_dir("incomplete");
        std::fs::write(dir.join(REGISTRY_FILE), b"old registry").unwrap();
        std::fs::write(dir.join(RESULTS_FILE), b"old results").unwrap();
        std::fs::write(dir.join(CANDIDATE_RESULTS_FILE), b"new results").unwrap();

        assert!(promote(&dir).is_err());

        assert_eq!(std::fs::read(dir.join(REGISTRY_FILE)).unwrap(), b"old registry");
        assert_eq!(std::fs::read(dir.join(RESULTS_FILE)).unwrap(), b"old results");
        assert!(!dir.join(PREVIOUS_RESULTS_FILE).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn audit_log_appends_one_line_per_record() {
        let dir = std::env::temp_dir().join(format!("nimbus-eval-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let verdict = evaluate(&metrics(0.80, 2.0), None, &Thresholds::default());
        let record =
            EvaluationRecord::new(&verdict, metrics(0.80, 2.0), None, Thresholds::default());
        record.append(&dir).unwrap();
        record.append(&dir).unwrap();

        let content = std::fs::read_to_string(dir.join(EVALUATIONS_FILE)).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: EvaluationRecord = serde_json::from_str(lines[0]).unwrap();
        assert!(back.accepted);
        assert!(back.previous.is_none());
    }
}
