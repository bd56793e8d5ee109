//! Per-target training pipeline
//!
//! Trains each target independently on a time-ordered observation table:
//! chronological train/test split, expanding-window cross-validation as a
//! stability diagnostic, final fit, and held-out metric computation.

use burn::tensor::backend::AutodiffBackend;

use crate::data::ObservationTable;
use crate::features::StandardScaler;
use crate::model::{ModelRegistry, Regressor, TargetModel};
use crate::training::fit::{fit_linear, FitConfig};
use crate::training::metrics::{
    mean_absolute_error, root_mean_squared_error, CvSummary, Diagnostics, RegressionMetrics,
    TargetReport, TrainingRun,
};
use crate::{Result, Target, TrainingConfig, WeatherError};

/// Trainer for the per-target weather models.
pub struct Trainer<B: AutodiffBackend> {
    fit: FitConfig,
    train_fraction: f64,
    cv_folds: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: &TrainingConfig, device: B::Device) -> Self {
        Trainer {
            fit: FitConfig {
                epochs: config.epochs,
                learning_rate: config.learning_rate,
            },
            train_fraction: config.train_fraction,
            cv_folds: config.cv_folds,
            device,
        }
    }

    /// Train every target the table supports.
    ///
    /// Temperature is mandatory; a table that cannot train it fails the
    /// run. Humidity and precipitation are opportunistic: missing columns
    /// skip the target with a warning and the run continues.
    pub fn train_all(&self, table: &ObservationTable) -> Result<(ModelRegistry, TrainingRun)> {
        let mut registry = ModelRegistry::new();
        let mut run = TrainingRun::new();

        for target in Target::ALL {
            match self.train_target(table, target)? {
                Some((model, report)) => {
                    log::info!(
                        "{}: {} (features: {:?})",
                        target,
                        report.metrics,
                        report.features
                    );
                    registry.insert(target, model);
                    run.targets.insert(target, report);
                }
                None => {
                    log::warn!("{}: skipped, column or features unavailable", target);
                }
            }
        }

        Ok((registry, run))
    }

    fn train_target(
        &self,
        table: &ObservationTable,
        target: Target,
    ) -> Result<Option<(TargetModel, TargetReport)>> {
        let Some(actuals) = table.column(target.as_str()) else {
            if target == Target::Temperature {
                return Err(WeatherError::MissingColumn(target.as_str().to_string()));
            }
            return Ok(None);
        };

        // Train on the intersection of declared and available features;
        // record the reduced list in the artifact.
        let declared = target.declared_features();
        let available: Vec<String> = declared
            .iter()
            .filter(|name| table.has_column(name))
            .map(|name| name.to_string())
            .collect();
        if available.len() < declared.len() {
            let missing: Vec<&str> = declared
                .iter()
                .filter(|name| !table.has_column(name))
                .copied()
                .collect();
            log::warn!("{}: features unavailable in data: {:?}", target, missing);
        }
        if available.is_empty() {
            if target == Target::Temperature {
                return Err(WeatherError::Training(
                    "no temperature features available in the data".to_string(),
                ));
            }
            return Ok(None);
        }

        let matrix = table.select_rows(&available)?;
        let n = matrix.len();
        let split = (n as f64 * self.train_fraction) as usize;
        if split == 0 || split == n {
            return Err(WeatherError::Training(format!(
                "{}: {} rows is not enough for a train/test split",
                target, n
            )));
        }

        // Chronological split, no shuffling: the test partition is strictly
        // in the future of the train partition.
        let (x_train, x_test) = matrix.split_at(split);
        let (y_train, y_test) = actuals.split_at(split);

        let scaler = StandardScaler::fit(x_train)?;
        let x_train_scaled = scaler.transform(x_train)?;
        let x_test_scaled = scaler.transform(x_test)?;

        let cv = self.cross_validate(target, &x_train_scaled, y_train)?;

        let model = fit_linear::<B>(&x_train_scaled, y_train, self.fit, &self.device)?;
        let predicted: Vec<f64> = x_test_scaled
            .iter()
            .map(|row| model.predict(row))
            .collect::<Result<_>>()?;
        let metrics = RegressionMetrics::compute(y_test, &predicted);

        let diagnostics = (target == Target::Temperature).then(|| Diagnostics {
            residuals: y_test.iter().zip(&predicted).map(|(a, p)| a - p).collect(),
            predictions: predicted.clone(),
            actual: y_test.to_vec(),
        });

        let report = TargetReport {
            metrics,
            cv,
            features: available.clone(),
            n_samples_train: split,
            n_samples_test: n - split,
            diagnostics,
        };
        let artifact = TargetModel {
            regressor: Regressor::Linear(model),
            scaler,
            features: available,
        };
        Ok(Some((artifact, report)))
    }

    /// Expanding-window cross-validation on the train partition: each fold
    /// validates on a contiguous forward block, never on data preceding its
    /// own training block.
    fn cross_validate(
        &self,
        target: Target,
        rows: &[Vec<f64>],
        actuals: &[f64],
    ) -> Result<Option<CvSummary>> {
        let folds = self.cv_folds;
        if folds < 2 {
            return Ok(None);
        }
        let n = rows.len();
        let Some(windows) = expanding_windows(n, folds) else {
            log::warn!(
                "{}: too few rows ({}) for {}-fold cross-validation",
                target,
                n,
                folds
            );
            return Ok(None);
        };

        let mut maes = Vec::with_capacity(folds);
        let mut rmses = Vec::with_capacity(folds);
        for (fold, (train_end, val_end)) in windows.into_iter().enumerate() {
            let model =
                fit_linear::<B>(&rows[..train_end], &actuals[..train_end], self.fit, &self.device)?;
            let predicted: Vec<f64> = rows[train_end..val_end]
                .iter()
                .map(|row| model.predict(row))
                .collect::<Result<_>>()?;
            let actual = &actuals[train_end..val_end];

            let mae = mean_absolute_error(actual, &predicted);
            let rmse = root_mean_squared_error(actual, &predicted);
            log::info!(
                "{}: fold {}/{}: MAE={:.4} RMSE={:.4}",
                target,
                fold + 1,
                folds,
                mae,
                rmse
            );
            maes.push(mae);
            rmses.push(rmse);
        }

        Ok(Some(CvSummary {
            cv_mae_mean: maes.iter().sum::<f64>() / folds as f64,
            cv_rmse_mean: rmses.iter().sum::<f64>() / folds as f64,
        }))
    }
}

/// Fold boundaries for expanding-window cross-validation over `n` rows.
///
/// Fold i trains on `[0, train_end)` and validates on `[train_end, val_end)`
/// where `val_end - train_end` is `n / (folds + 1)`; each validation block
/// sits strictly after its own training block. `None` when the rows cannot
/// fill a single fold.
fn expanding_windows(n: usize, folds: usize) -> Option<Vec<(usize, usize)>> {
    let fold_size = n / (folds + 1);
    if fold_size == 0 {
        return None;
    }
    Some(
        (0..folds)
            .map(|fold| {
                let train_end = n - (folds - fold) * fold_size;
                (train_end, train_end + fold_size)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            learning_rate: 0.1,
            train_fraction: 0.8,
            cv_folds: 5,
        }
    }

    fn temperature_table(rows: usize) -> ObservationTable {
        let columns = vec![
            "pressure_msl".to_string(),
            "radiation".to_string(),
            "wind_y".to_string(),
            "temperature".to_string(),
        ];
        let data: Vec<Vec<f64>> = (0..rows)
            .map(|i| {
                let pressure = 1000.0 + (i % 17) as f64;
                let radiation = ((i * 7) % 29) as f64 * 10.0;
                let wind_y = (((i * 13) % 7) as f64 - 3.0) / 3.0;
                let temperature = 0.4 * (pressure - 1000.0) - 0.01 * radiation + 2.0 * wind_y + 20.0;
                vec![pressure, radiation, wind_y, temperature]
            })
            .collect();
        ObservationTable::from_columns(columns, data)
    }

    #[test]
    fn trains_temperature_on_a_noiseless_linear_table() {
        let table = temperature_table(120);
        let trainer = Trainer::<TestBackend>::new(&config(2000), Default::default());
        let (registry, run) = trainer.train_all(&table).unwrap();

        assert!(registry.get(Target::Temperature).is_some());
        assert!(registry.get(Target::Humidity).is_none());
        assert!(registry.get(Target::Precipitation).is_none());

        let report = run.target(Target::Temperature).unwrap();
        assert!(report.metrics.r2 > 0.99, "r2={}", report.metrics.r2);
        assert!(report.metrics.mae < 0.5, "mae={}", report.metrics.mae);
        assert_eq!(report.n_samples_train, 96);
        assert_eq!(report.n_samples_test, 24);
        assert!(report.cv.is_some());
        let diagnostics = report.diagnostics.as_ref().unwrap();
        assert_eq!(diagnostics.residuals.len(), 24);
    }

    #[test]
    fn optional_target_trains_on_feature_intersection() {
        // w_63 is declared for humidity but absent from the table.
        let columns = vec![
            "pressure_msl".to_string(),
            "radiation".to_string(),
            "wind_y".to_string(),
            "w_51".to_string(),
            "w_53".to_string(),
            "w_61".to_string(),
            "temperature".to_string(),
            "humidity".to_string(),
        ];
        let data: Vec<Vec<f64>> = (0..90)
            .map(|i| {
                let radiation = ((i * 7) % 29) as f64 * 10.0;
                let w_51 = ((i % 9) == 0) as u8 as f64;
                let w_53 = ((i % 9) == 1) as u8 as f64;
                let w_61 = ((i % 9) == 2) as u8 as f64;
                let temperature = 20.0 - 0.01 * radiation + 0.2 * (i % 17) as f64;
                let humidity = 70.0 - 0.05 * radiation + 8.0 * w_51 + 6.0 * w_53 + 10.0 * w_61;
                vec![
                    1000.0 + (i % 17) as f64,
                    radiation,
                    ((i % 5) as f64 - 2.0) / 2.0,
                    w_51,
                    w_53,
                    w_61,
                    temperature,
                    humidity,
                ]
            })
            .collect();
        let table = ObservationTable::from_columns(columns, data);

        let trainer = Trainer::<TestBackend>::new(&config(2000), Default::default());
        let (registry, run) = trainer.train_all(&table).unwrap();

        let humidity = registry.get(Target::Humidity).unwrap();
        assert_eq!(
            humidity.features,
            vec!["radiation", "w_51", "w_53", "w_61"]
        );
        assert_eq!(humidity.scaler.dim(), 4);
        let report = run.target(Target::Humidity).unwrap();
        assert!(report.metrics.r2 > 0.95, "r2={}", report.metrics.r2);
        // Precipitation has no column at all and is skipped quietly.
        assert!(registry.get(Target::Precipitation).is_none());
    }

    #[test]
    fn expanding_windows_validate_strictly_after_their_training_block() {
        let windows = expanding_windows(96, 5).unwrap();
        assert_eq!(
            windows,
            vec![(16, 32), (32, 48), (48, 64), (64, 80), (80, 96)]
        );

        for (train_end, val_end) in &windows {
            // The training block [0, train_end) is non-empty and ends where
            // the validation block begins.
            assert!(*train_end > 0);
            assert!(*val_end > *train_end);
        }
        // Each validation block joins the next fold's training data.
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        // The final fold validates on the last rows.
        assert_eq!(windows.last().unwrap().1, 96);
    }

    #[test]
    fn expanding_windows_need_at_least_one_row_per_fold() {
        assert!(expanding_windows(5, 5).is_none());
        assert!(expanding_windows(6, 5).is_some());
    }

    #[test]
    fn missing_temperature_column_fails_the_run() {
        let table = ObservationTable::from_columns(
            vec!["radiation".to_string()],
            vec![vec![1.0], vec![2.0]],
        );
        let trainer = Trainer::<TestBackend>::new(&config(10), Default::default());
        assert!(trainer.train_all(&table).is_err());
    }

    #[test]
    fn too_few_rows_fail_the_split() {
        let table = temperature_table(1);
        let trainer = Trainer::<TestBackend>::new(&config(10), Default::default());
        assert!(trainer.train_all(&table).is_err());
    }
}
