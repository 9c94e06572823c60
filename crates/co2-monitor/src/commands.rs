//! Command Dispatch
//!
//! Transports (chat bot, HTTP) reduce user requests to [`Command`]s; this
//! module applies them to the subscriber registry.

use alerting::{Notifier, SubscriberRegistry, UserId};
use std::sync::Arc;
use telegram::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Apply one command; returns whether it changed anything
pub async fn dispatch<N: Notifier>(registry: &SubscriberRegistry<N>, user: UserId, command: Command) -> bool {
    match command {
        Command::Start => registry.subscribe(user).await,
        Command::Stop => registry.unsubscribe(user).await,
        Command::Sleep(minutes) => {
            info!(%user, "SLEEP {} min", minutes);
            registry.set_snooze(user, minutes).await
        }
    }
}

/// Drain the command queue until every sender is gone or the token fires
pub async fn run_dispatcher<N: Notifier>(
    registry: Arc<SubscriberRegistry<N>>,
    mut commands: mpsc::Receiver<(UserId, Command)>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = commands.recv() => next,
        };

        let Some((user, command)) = next else {
            break;
        };
        dispatch(&registry, user, command).await;
    }

    info!("Command dispatcher stopped");
}
