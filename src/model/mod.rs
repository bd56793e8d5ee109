//! Model artifacts
//!
//! Regressor parameters and the per-target registry manifest.

pub mod linear;
pub mod registry;

pub use linear::{LinearRegressor, Regressor};
pub use registry::{ModelRegistry, TargetModel};
