//! Sensor Feed Error Types

use thiserror::Error;

/// Errors that can occur while reading the sensor feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No line received within the configured timeout
    #[error("Timeout waiting for sensor line after {0}s")]
    Timeout(u64),

    /// Line could not be parsed as a number
    #[error("Malformed reading: {0:?}")]
    Malformed(String),

    /// Value parsed but lies outside the plausible sensor range
    #[error("Reading {value} is out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },
}

impl FeedError {
    /// Whether the error concerns a single line rather than the connection.
    ///
    /// Line-level errors drop the reading; connection errors force a reopen.
    pub fn is_bad_reading(&self) -> bool {
        matches!(self, FeedError::Malformed(_) | FeedError::OutOfRange { .. })
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => FeedError::Malformed(err.to_string()),
            _ => FeedError::SerialError(err.to_string()),
        }
    }
}

impl From<tokio_serial::Error> for FeedError {
    fn from(err: tokio_serial::Error) -> Self {
        FeedError::SerialError(err.to_string())
    }
}
