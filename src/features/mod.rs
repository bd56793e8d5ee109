//! Feature engineering
//!
//! Turns raw observations into the ordered numeric vectors the per-target
//! models were fitted on.

pub mod encoding;
pub mod scaling;

pub use encoding::FeatureEncoder;
pub use scaling::StandardScaler;
