//! Runtime Choice of Notification Sink

use alerting::{Alert, LogNotifier, Notifier, NotifyError, UserId};
use std::sync::Arc;
use telegram::TelegramClient;

/// Telegram when configured, log output otherwise
pub enum AlertSink {
    Telegram(Arc<TelegramClient>),
    Log(LogNotifier),
}

impl Notifier for AlertSink {
    async fn send(&self, user: UserId, alert: &Alert) -> Result<(), NotifyError> {
        match self {
            AlertSink::Telegram(client) => client.send(user, alert).await,
            AlertSink::Log(log) => log.send(user, alert).await,
        }
    }
}
