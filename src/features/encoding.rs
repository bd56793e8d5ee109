//! Observation encoding: circular wind direction and weather-code indicators

use crate::Observation;

/// Weather codes with their own indicator feature (`w_<code>`). Drizzle and
/// rain codes only; anything else contributes no indicator.
pub const SIGNIFICANT_WEATHER_CODES: [i64; 5] = [51, 53, 61, 63, 65];

/// Default substituted when an observation lacks a feature. Every reference
/// feature defaults to zero; the table exists so the defaults are auditable
/// rather than implicit.
pub const FEATURE_DEFAULTS: &[(&str, f64)] = &[
    ("pressure_msl", 0.0),
    ("radiation", 0.0),
    ("cloud_cover", 0.0),
    ("windspeed", 0.0),
    ("wind_x", 0.0),
    ("wind_y", 0.0),
    ("w_51", 0.0),
    ("w_53", 0.0),
    ("w_61", 0.0),
    ("w_63", 0.0),
    ("w_65", 0.0),
];

/// Default value for a named feature.
pub fn default_for(name: &str) -> f64 {
    FEATURE_DEFAULTS
        .iter()
        .find(|(feature, _)| *feature == name)
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

/// Stateless transformation of raw observations into feature vectors.
///
/// Both training ingestion and online inference go through this type, so a
/// model always sees the exact encoding it was fitted on.
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Derive `wind_x`/`wind_y` and the `w_<code>` indicators, merging them
    /// into a copy of the observation. Existing fields other than the
    /// derived ones are left untouched.
    pub fn expand(observation: &Observation) -> Observation {
        let mut expanded = observation.clone();

        if let Some(direction) = observation.get("winddirection") {
            let radians = direction.to_radians();
            expanded.set("wind_x", radians.sin());
            expanded.set("wind_y", radians.cos());
        }

        if let Some(code) = observation.get("weathercode") {
            for significant in SIGNIFICANT_WEATHER_CODES {
                let value = if code == significant as f64 { 1.0 } else { 0.0 };
                expanded.set(format!("w_{}", significant), value);
            }
        }

        expanded
    }

    /// Project an observation onto an ordered feature list.
    ///
    /// Output length and order match `features` exactly; absent fields take
    /// their configured default. Pure: the same observation always encodes
    /// to the same vector.
    pub fn encode(observation: &Observation, features: &[String]) -> Vec<f64> {
        let expanded = Self::expand(observation);
        features
            .iter()
            .map(|name| expanded.get(name).unwrap_or_else(|| default_for(name)))
            .collect()
    }
}
