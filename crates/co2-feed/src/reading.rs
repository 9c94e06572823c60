//! Sensor Reading Types

use crate::error::FeedError;
use serde::{Deserialize, Serialize};

/// A single CO2 concentration sample in ppm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Concentration in parts per million
    pub value: f64,
    /// Arrival order assigned by the source (starts at 0)
    pub seq: u64,
}

impl Reading {
    /// Create a new reading
    pub fn new(value: f64, seq: u64) -> Self {
        Self { value, seq }
    }
}

/// Parse one line of sensor output into a value.
///
/// The sensor prints one decimal number per line; surrounding whitespace
/// and the trailing carriage return are ignored.
pub fn parse_reading(line: &str) -> Result<f64, FeedError> {
    let trimmed = line.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| FeedError::Malformed(trimmed.to_string()))?;

    if !value.is_finite() {
        return Err(FeedError::Malformed(trimmed.to_string()));
    }

    Ok(value)
}
