//! Serial Line Reader for CO2 Sensors
//!
//! The sensor firmware prints one decimal ppm value per line. This module
//! opens the port, splits the byte stream into lines and validates each.
//! Line noise (including bytes that are not UTF-8) only costs that line.

use crate::error::FeedError;
use crate::reading::Reading;
use crate::source::ReadingSource;
use crate::validator::{ValidationConfig, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

/// Serial port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyUSB0" or "COM3"), or "mock"
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Seconds to wait for a line before reporting a timeout (0 = wait forever)
    #[serde(default)]
    pub timeout: u64,
    /// Fixed delay before the first read, for sensors that need warm-up
    #[serde(default)]
    pub startup_delay_ms: u64,
    /// Delay before reopening the port after a failure
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_baud() -> u32 {
    9600
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: default_baud(),
            timeout: 0,
            startup_delay_ms: 0,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl SerialConfig {
    /// Whether the configured port selects the built-in mock source
    pub fn is_mock(&self) -> bool {
        self.port.eq_ignore_ascii_case("mock")
    }

    /// Line timeout, if any
    pub fn line_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Line-oriented reading source over any async byte stream
pub struct SerialSource<R = SerialStream> {
    /// Device label for logs
    device: String,
    lines: Split<BufReader<R>>,
    validator: Validator,
    timeout: Option<Duration>,
    next_seq: u64,
}

impl SerialSource<SerialStream> {
    /// Open the configured serial port
    pub async fn open(config: &SerialConfig, validation: ValidationConfig) -> Result<Self, FeedError> {
        if config.startup_delay_ms > 0 {
            debug!("Waiting {}ms before reading {}", config.startup_delay_ms, config.port);
            tokio::time::sleep(Duration::from_millis(config.startup_delay_ms)).await;
        }

        info!("Opening serial port {} at {} baud", config.port, config.baud);
        let stream = tokio_serial::new(&config.port, config.baud)
            .timeout(config.line_timeout().unwrap_or(Duration::from_secs(1)))
            .open_native_async()?;

        Ok(Self::from_reader(&config.port, stream, validation, config.line_timeout()))
    }
}

impl<R: AsyncRead + Unpin + Send> SerialSource<R> {
    /// Wrap an already-open byte stream
    pub fn from_reader(
        device: &str,
        reader: R,
        validation: ValidationConfig,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            device: device.to_string(),
            lines: BufReader::new(reader).split(b'\n'),
            validator: Validator::new(validation),
            timeout,
            next_seq: 0,
        }
    }

    /// Device label
    pub fn device(&self) -> &str {
        &self.device
    }

    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.lines.next_segment())
                .await
                .map_err(|_| FeedError::Timeout(limit.as_secs()))?
                .map_err(FeedError::from),
            None => self.lines.next_segment().await.map_err(FeedError::from),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ReadingSource for SerialSource<R> {
    async fn next_reading(&mut self) -> Result<Option<Reading>, FeedError> {
        loop {
            let Some(bytes) = self.next_line().await? else {
                debug!("Serial stream {} reached EOF", self.device);
                return Ok(None);
            };
            let line = String::from_utf8(bytes)
                .map_err(|e| FeedError::Malformed(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;

            // Sensors emit blank keep-alive lines between samples
            if line.trim().is_empty() {
                continue;
            }

            let value = self.validator.check_line(&line)?;
            let reading = Reading::new(value, self.next_seq);
            self.next_seq += 1;
            return Ok(Some(reading));
        }
    }
}
