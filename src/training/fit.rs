//! Linear model fitting
//!
//! Full-batch gradient descent on a single linear layer with MSE loss. The
//! problem is convex and the layer is zero-initialized, so the fit is
//! deterministic and converges to the least-squares solution.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

use crate::model::LinearRegressor;
use crate::{Result, WeatherError};

#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            epochs: 500,
            learning_rate: 0.1,
        }
    }
}

/// Fit a linear regressor on a standardized row-major matrix, extracting
/// the coefficients into a backend-free parameter struct.
pub fn fit_linear<B: AutodiffBackend>(
    rows: &[Vec<f64>],
    targets: &[f64],
    config: FitConfig,
    device: &B::Device,
) -> Result<LinearRegressor> {
    let n = rows.len();
    let dim = rows.first().map(Vec::len).unwrap_or(0);
    if n == 0 || dim == 0 {
        return Err(WeatherError::Training(
            "cannot fit on an empty training matrix".to_string(),
        ));
    }
    if n != targets.len() {
        return Err(WeatherError::Training(format!(
            "{} feature rows but {} target values",
            n,
            targets.len()
        )));
    }

    let x_data: Vec<f32> = rows
        .iter()
        .flat_map(|row| row.iter().map(|v| *v as f32))
        .collect();
    let y_data: Vec<f32> = targets.iter().map(|v| *v as f32).collect();

    let x = Tensor::<B, 1>::from_floats(x_data.as_slice(), device).reshape([n, dim]);
    let y = Tensor::<B, 1>::from_floats(y_data.as_slice(), device).reshape([n, 1]);

    let mut model: Linear<B> = LinearConfig::new(dim, 1)
        .with_initializer(Initializer::Zeros)
        .init(device);
    let mut optimizer = SgdConfig::new().init::<B, Linear<B>>();

    for epoch in 0..config.epochs {
        let prediction = model.forward(x.clone());
        let loss = (prediction - y.clone()).powf_scalar(2.0).mean();

        if epoch % 100 == 0 || epoch + 1 == config.epochs {
            let loss_value: f32 = loss.clone().into_scalar().elem();
            log::debug!(
                "epoch {}/{}: mse={:.6}",
                epoch + 1,
                config.epochs,
                loss_value
            );
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optimizer.step(config.learning_rate, model, grads);
    }

    Ok(extract_coefficients(&model))
}

fn extract_coefficients<B: AutodiffBackend>(model: &Linear<B>) -> LinearRegressor {
    let weight_data = model.weight.val().to_data();
    let weight_slice: &[f32] = weight_data.as_slice().unwrap();
    let weights: Vec<f64> = weight_slice.iter().map(|w| *w as f64).collect();

    let intercept = model
        .bias
        .as_ref()
        .map(|bias| {
            let bias_data = bias.val().to_data();
            let bias_slice: &[f32] = bias_data.as_slice().unwrap();
            bias_slice[0] as f64
        })
        .unwrap_or(0.0);

    LinearRegressor::new(weights, intercept)
}
