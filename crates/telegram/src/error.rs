//! Bot Error Types

use alerting::NotifyError;
use thiserror::Error;

/// Errors talking to the Bot API
#[derive(Debug, Error)]
pub enum BotError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with `ok: false`
    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Invalid bot configuration
    #[error("Invalid bot configuration: {0}")]
    Config(String),
}

impl From<BotError> for NotifyError {
    fn from(err: BotError) -> Self {
        match err {
            BotError::Api { .. } => NotifyError::Rejected(err.to_string()),
            other => NotifyError::Transport(other.to_string()),
        }
    }
}
