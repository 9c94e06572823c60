//! Bot API Client

use crate::error::BotError;
use crate::types::{ApiResponse, Update};
use alerting::{Alert, Notifier, NotifyError, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Extra time allowed on top of the long-poll timeout before giving up
const REQUEST_SLACK_SECS: u64 = 10;

/// Bot configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Disable to run with log-only notifications
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bot token issued by BotFather
    #[serde(default)]
    pub token: String,
    /// API base URL
    #[serde(default = "default_url")]
    pub url: String,
    /// User subscribed at startup, if any
    #[serde(default)]
    pub user: Option<i64>,
    /// Long-poll timeout (seconds)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
    /// Pause after a failed poll (seconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            token: String::new(),
            url: default_url(),
            user: None,
            poll_timeout: default_poll_timeout(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), BotError> {
        if !self.enabled {
            return Ok(());
        }
        if self.token.trim().is_empty() {
            return Err(BotError::Config("telegram.token is empty".to_string()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(BotError::Config(format!("telegram.url {:?} is not an HTTP URL", self.url)));
        }
        Ok(())
    }

    /// The user to subscribe at startup; ids of zero or below mean none
    pub fn default_user(&self) -> Option<UserId> {
        self.user.filter(|id| *id > 0).map(UserId)
    }
}

// The token is a credential; keep it out of logs
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("enabled", &self.enabled)
            .field("token", &"<redacted>")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("poll_timeout", &self.poll_timeout)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// HTTP client bound to one bot
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &BotConfig) -> Result<Self, BotError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout + REQUEST_SLACK_SECS))
            .build()?;

        Ok(Self {
            http,
            api_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Send a plain-text message to a chat
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let _: serde_json::Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        debug!(chat_id, "Message delivered");
        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, BotError> {
        self.call(
            "getUpdates",
            &json!({ "offset": offset, "timeout": timeout, "allowed_updates": ["message"] }),
        )
        .await
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, BotError> {
        let response = self.http.post(self.endpoint(method)).json(body).send().await?;
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await?;
        envelope.into_result(status)
    }
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl Notifier for TelegramClient {
    async fn send(&self, user: UserId, alert: &Alert) -> Result<(), NotifyError> {
        self.send_message(user.0, &alert.message()).await.map_err(NotifyError::from)
    }
}
