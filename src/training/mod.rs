//! Model training
//!
//! Per-target fitting, regression metrics, and promotion gating.

pub mod evaluate;
pub mod fit;
pub mod metrics;
pub mod trainer;

pub use evaluate::{EvaluationRecord, Thresholds, Verdict};
pub use fit::{fit_linear, FitConfig};
pub use metrics::{RegressionMetrics, TargetReport, TrainingRun};
pub use trainer::Trainer;
