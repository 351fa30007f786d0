use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::FeatureError;

/// Options accepted by [`FeatureBuilder::training_data`](crate::features::FeatureBuilder::training_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Keep only orders whose status is `delivered`.
    pub only_delivered: bool,

    /// Compute the mean seller-customer distance per order and require it in
    /// the output. Needs the `sellers`, `customers` and `geolocation` tables.
    pub include_distance: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            only_delivered: true,
            include_distance: false,
        }
    }
}

impl FeatureConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, FeatureError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
