//! Long-Polling Command Receiver

use crate::client::TelegramClient;
use crate::command::Command;
use crate::error::BotError;
use crate::types::Update;
use alerting::UserId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can answer a `getUpdates` long poll
pub trait UpdateSource: Send + Sync + 'static {
    fn get_updates(&self, offset: i64, timeout: u64) -> impl Future<Output = Result<Vec<Update>, BotError>> + Send;
}

impl UpdateSource for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, BotError> {
        TelegramClient::get_updates(self, offset, timeout).await
    }
}

/// Pulls chat updates and forwards recognised commands
pub struct CommandPoller<U = TelegramClient> {
    source: Arc<U>,
    poll_timeout: u64,
    retry_delay: Duration,
    offset: i64,
}

impl<U: UpdateSource> CommandPoller<U> {
    pub fn new(source: Arc<U>, poll_timeout: u64, retry_delay: Duration) -> Self {
        Self {
            source,
            poll_timeout,
            retry_delay,
            offset: 0,
        }
    }

    /// Poll until cancelled or until the receiving side hangs up.
    ///
    /// Failed polls are logged and retried after `retry_delay`.
    pub async fn run(mut self, commands: mpsc::Sender<(UserId, Command)>, cancel: CancellationToken) {
        info!("Telegram command poller started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.source.get_updates(self.offset, self.poll_timeout) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Polling Telegram failed, retrying in {:?}", self.retry_delay);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => continue,
                    }
                }
            };

            for update in updates {
                // Acknowledge every update, including ones without a command
                self.offset = self.offset.max(update.update_id + 1);
                let Some((user, command)) = update.command() else {
                    continue;
                };
                debug!(%user, ?command, "Received chat command");
                if commands.send((user, command)).await.is_err() {
                    info!("Command receiver closed, stopping poller");
                    return;
                }
            }
        }

        info!("Telegram command poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays canned poll results, then hangs like an idle long poll
    #[derive(Default)]
    struct ScriptedUpdates {
        script: Mutex<VecDeque<Result<Vec<Update>, BotError>>>,
        offsets: Mutex<Vec<i64>>,
    }

    impl ScriptedUpdates {
        fn new(script: Vec<Result<Vec<Update>, BotError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                offsets: Mutex::default(),
            })
        }

        fn offsets(&self) -> Vec<i64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    impl UpdateSource for ScriptedUpdates {
        async fn get_updates(&self, offset: i64, _timeout: u64) -> Result<Vec<Update>, BotError> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn update(update_id: i64, from: i64, text: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "from": { "id": from },
                "chat": { "id": from },
                "text": text,
            }
        }))
        .unwrap()
    }

    fn api_error() -> BotError {
        BotError::Api { code: 502, description: "Bad Gateway".to_string() }
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_advances_and_errors_are_retried() {
        let source = ScriptedUpdates::new(vec![
            Ok(vec![update(5, 1, "/start"), update(6, 1, "hello")]),
            Err(api_error()),
            Ok(vec![update(9, 2, "/sleep 15")]),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let poller = CommandPoller::new(source.clone(), 10, Duration::from_secs(5));
        let task = tokio::spawn(poller.run(tx, cancel.clone()));

        assert_eq!(rx.recv().await, Some((UserId(1), Command::Start)));
        assert_eq!(rx.recv().await, Some((UserId(2), Command::Sleep(15))));
        assert!(start.elapsed() >= Duration::from_secs(5), "retry must wait out the delay");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.offsets(), vec![0, 7, 7, 10]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_closes() {
        let source = ScriptedUpdates::new(vec![Ok(vec![update(1, 3, "/stop")])]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let poller = CommandPoller::new(source.clone(), 10, Duration::from_secs(5));
        poller.run(tx, CancellationToken::new()).await;

        assert_eq!(source.offsets(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_retry_delay() {
        let source = ScriptedUpdates::new(vec![Err(api_error())]);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let poller = CommandPoller::new(source.clone(), 10, Duration::from_secs(3600));
        let task = tokio::spawn(poller.run(tx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        cancel.cancel();
        task.await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(source.offsets(), vec![0]);
    }
}
