//! Online prediction from deployed models

pub mod inference;

pub use inference::{Forecast, Predictor, TemperatureForecast, TEMPERATURE_BAND};
