//! Bot API Wire Types
//!
//! Only the fields the command transport reads are modelled; serde skips
//! the rest.

use crate::command::Command;
use crate::error::BotError;
use alerting::UserId;
use serde::Deserialize;

/// Envelope wrapping every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the envelope, using `status` when the API omits an error code
    pub fn into_result(self, status: u16) -> Result<T, BotError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(BotError::Api {
                code: i64::from(status),
                description: "response without result".to_string(),
            }),
            (false, _) => Err(BotError::Api {
                code: self.error_code.unwrap_or(i64::from(status)),
                description: self.description.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

impl Update {
    /// Sender and parsed command, if this update carries one
    pub fn command(&self) -> Option<(UserId, Command)> {
        let message = self.message.as_ref()?;
        let sender = message.from.as_ref()?;
        let command = Command::parse(message.text.as_deref()?)?;
        Some((UserId(sender.id), command))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}
