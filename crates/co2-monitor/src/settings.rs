//! Application Settings
//!
//! Layered configuration: a TOML file first, then `CO2__SECTION__KEY`
//! environment variables. Invalid settings are fatal at startup.

use alerting::AlertConfig;
use co2_feed::{SerialConfig, ValidationConfig};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::net::SocketAddr;
use telegram::{BotConfig, BotError};
use thiserror::Error;

/// Settings loading and validation errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid alert thresholds: {0}")]
    Alert(#[from] alerting::ConfigError),

    #[error(transparent)]
    Bot(#[from] BotError),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// HTTP control API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Seconds for the rate limiter to replenish one request
    #[serde(default = "default_replenish_secs")]
    pub replenish_secs: u64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_true() -> bool {
    true
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_replenish_secs() -> u64 {
    2
}

fn default_burst() -> u32 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_addr(),
            replenish_secs: default_replenish_secs(),
            burst: default_burst(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub values: AlertConfig,
    pub serial: SerialConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub telegram: BotConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Settings {
    /// Load from a file (extension picks the format) plus the environment
    pub fn load(path: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?;
        Self::finish(config)
    }

    /// Load from an in-memory TOML document plus the environment
    pub fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(env_source())
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, SettingsError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.values.validate()?;
        self.telegram.validate()?;

        if !self.serial.is_mock() {
            if self.serial.port.trim().is_empty() {
                return Err(SettingsError::Invalid {
                    key: "serial.port",
                    reason: "must not be empty".to_string(),
                });
            }
            if self.serial.baud == 0 {
                return Err(SettingsError::Invalid {
                    key: "serial.baud",
                    reason: "must be positive".to_string(),
                });
            }
        }

        if self.validation.min >= self.validation.max {
            return Err(SettingsError::Invalid {
                key: "validation",
                reason: format!("min {} must be below max {}", self.validation.min, self.validation.max),
            });
        }

        if self.server.enabled {
            self.server_addr()?;
            if self.server.replenish_secs == 0 || self.server.burst == 0 {
                return Err(SettingsError::Invalid {
                    key: "server.replenish_secs",
                    reason: "rate and burst must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn server_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.server.addr.parse().map_err(|e| SettingsError::Invalid {
            key: "server.addr",
            reason: format!("{}", e),
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("CO2").separator("__").try_parsing(true)
}
