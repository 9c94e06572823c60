//! Range Validation for Sensor Readings

use crate::error::FeedError;
use serde::{Deserialize, Serialize};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Lowest plausible reading (ppm)
    #[serde(default = "default_min")]
    pub min: f64,
    /// Highest plausible reading (ppm)
    #[serde(default = "default_max")]
    pub max: f64,
}

fn default_min() -> f64 {
    0.0
}

fn default_max() -> f64 {
    50_000.0
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
        }
    }
}

/// Rejects values the sensor cannot physically report
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a single value against the configured range
    pub fn validate(&self, value: f64) -> Result<f64, FeedError> {
        if value < self.config.min || value > self.config.max {
            Err(FeedError::OutOfRange {
                value,
                min: self.config.min,
                max: self.config.max,
            })
        } else {
            Ok(value)
        }
    }

    /// Parse and validate a raw sensor line
    pub fn check_line(&self, line: &str) -> Result<f64, FeedError> {
        self.validate(crate::reading::parse_reading(line)?)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
