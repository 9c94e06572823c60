//! Alerting Error Types

use thiserror::Error;

/// Invalid alert threshold configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Threshold is NaN or infinite
    #[error("{field} threshold must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    /// `good` must sit strictly below `warn`
    #[error("good threshold {good} must be below warn threshold {warn}")]
    ThresholdOrder { good: f64, warn: f64 },

    /// Good cooldown multiplier must be at least 1
    #[error("good cooldown multiplier must be at least 1")]
    ZeroMultiplier,
}

/// Errors reported by a notification sink
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink could not be reached
    #[error("Notification transport failed: {0}")]
    Transport(String),

    /// The sink refused the message
    #[error("Notification rejected: {0}")]
    Rejected(String),
}
