//! Alert Thresholds and Cooldowns

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which side of the thresholds a reading fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Reading at or above `warn`
    Bad,
    /// Reading at or below `good`
    Good,
}

impl AlertKind {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Bad => "bad",
            AlertKind::Good => "good",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert configuration, shared read-only by every subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Alert "bad" when a reading is at or above this value (ppm)
    pub warn: f64,
    /// Alert "good" when a reading is at or below this value (ppm)
    pub good: f64,
    /// Silence after a bad alert (minutes)
    #[serde(alias = "timeout")]
    pub alert_cooldown_minutes: u64,
    /// Silence after a good alert, as a multiple of the alert cooldown
    #[serde(default = "default_good_multiplier", alias = "good_multiplier")]
    pub good_cooldown_multiplier: u32,
}

fn default_good_multiplier() -> u32 {
    2
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warn: 1000.0,
            good: 400.0,
            alert_cooldown_minutes: 10,
            good_cooldown_multiplier: default_good_multiplier(),
        }
    }
}

impl AlertConfig {
    /// Reject thresholds the evaluator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.warn.is_finite() {
            return Err(ConfigError::NotFinite { field: "warn", value: self.warn });
        }
        if !self.good.is_finite() {
            return Err(ConfigError::NotFinite { field: "good", value: self.good });
        }
        if self.good >= self.warn {
            return Err(ConfigError::ThresholdOrder { good: self.good, warn: self.warn });
        }
        if self.good_cooldown_multiplier == 0 {
            return Err(ConfigError::ZeroMultiplier);
        }
        Ok(())
    }

    /// Classify a reading; `None` means it sits strictly between the bounds
    pub fn classify(&self, value: f64) -> Option<AlertKind> {
        if value >= self.warn {
            Some(AlertKind::Bad)
        } else if value <= self.good {
            Some(AlertKind::Good)
        } else {
            None
        }
    }

    /// Cooldown after a bad alert
    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_minutes.saturating_mul(60))
    }

    /// Cooldown after a good alert
    pub fn good_cooldown(&self) -> Duration {
        self.alert_cooldown().saturating_mul(self.good_cooldown_multiplier)
    }

    /// Suspension that follows an alert of the given kind
    pub fn cooldown_for(&self, kind: AlertKind) -> Duration {
        match kind {
            AlertKind::Bad => self.alert_cooldown(),
            AlertKind::Good => self.good_cooldown(),
        }
    }
}
