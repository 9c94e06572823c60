//! Telegram Bot Transport
//!
//! Pushes alert messages through the Telegram Bot HTTP API and turns the
//! `/start`, `/stop` and `/sleep N` chat commands into [`Command`]s for the
//! application to dispatch.

mod client;
mod command;
mod error;
mod poller;
mod types;

pub use client::{BotConfig, TelegramClient};
pub use command::Command;
pub use error::BotError;
pub use poller::{CommandPoller, UpdateSource};
pub use types::{ApiResponse, Chat, Message, Update, User};
