//! Subscriber Registry
//!
//! Single owner of per-user alert state. A user is active while it has an
//! entry here; the entry holds the hub channel, the snooze cell and the
//! evaluator task. All mutation goes through one async mutex, and
//! unsubscribe waits for the evaluator to exit while holding it, so a user
//! never has two evaluators running at once.

use crate::config::AlertConfig;
use crate::evaluator::{AlertEvaluator, SnoozeCell};
use crate::hub::{BroadcastHub, ChannelId};
use crate::notifier::Notifier;
use crate::user::UserId;
use metrics::gauge;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Live state of one active subscriber
struct Subscriber {
    channel: ChannelId,
    snooze: SnoozeCell,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Public view of an active subscriber
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberInfo {
    pub user: UserId,
    /// Pending snooze in whole minutes, if any
    pub snooze_minutes: Option<u64>,
}

/// Registry of active subscribers and their evaluator tasks
pub struct SubscriberRegistry<N> {
    hub: Arc<BroadcastHub>,
    config: Arc<AlertConfig>,
    notifier: Arc<N>,
    subscribers: Mutex<HashMap<UserId, Subscriber>>,
}

impl<N: Notifier> SubscriberRegistry<N> {
    pub fn new(hub: Arc<BroadcastHub>, config: Arc<AlertConfig>, notifier: Arc<N>) -> Self {
        Self {
            hub,
            config,
            notifier,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Start alerting a user.
    ///
    /// Returns false if the user was already active; the running evaluator
    /// is kept and no second one is started.
    pub async fn subscribe(&self, user: UserId) -> bool {
        let mut subscribers = self.subscribers.lock().await;

        if let Some(existing) = subscribers.get(&user) {
            if !existing.task.is_finished() {
                debug!(%user, "Already subscribed");
                return false;
            }
            // The evaluator ended on its own (its channel was pruned); replace it
            if let Some(stale) = subscribers.remove(&user) {
                self.retire(user, stale).await;
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let channel = self.hub.register(tx);
        let snooze = SnoozeCell::new();
        let cancel = CancellationToken::new();

        let evaluator = AlertEvaluator::new(
            user,
            self.config.clone(),
            self.notifier.clone(),
            rx,
            snooze.clone(),
            cancel.clone(),
        );
        let task = tokio::spawn(evaluator.run());

        subscribers.insert(user, Subscriber { channel, snooze, cancel, task });
        gauge!("co2_active_subscribers").set(subscribers.len() as f64);
        info!(%user, "Subscribed to CO2 alerts");
        true
    }

    /// Stop alerting a user and wait for its evaluator to exit.
    ///
    /// Returns false if the user was not subscribed.
    pub async fn unsubscribe(&self, user: UserId) -> bool {
        let mut subscribers = self.subscribers.lock().await;

        let Some(subscriber) = subscribers.remove(&user) else {
            debug!(%user, "Unsubscribe ignored: not subscribed");
            return false;
        };

        self.retire(user, subscriber).await;
        gauge!("co2_active_subscribers").set(subscribers.len() as f64);
        info!(%user, "Unsubscribed from CO2 alerts");
        true
    }

    /// Mute a user for `minutes`; zero or negative clears the snooze.
    ///
    /// Returns false if the user is not subscribed.
    pub async fn set_snooze(&self, user: UserId, minutes: i64) -> bool {
        let subscribers = self.subscribers.lock().await;

        let Some(subscriber) = subscribers.get(&user) else {
            debug!(%user, "Snooze ignored: not subscribed");
            return false;
        };

        match subscriber.snooze.set_minutes(minutes) {
            Some(duration) => info!(%user, "Snooze set to {:?}", duration),
            None => info!(%user, "Snooze cleared"),
        }
        true
    }

    pub async fn is_active(&self, user: UserId) -> bool {
        self.subscribers.lock().await.contains_key(&user)
    }

    /// Pending snooze of an active user
    pub async fn snooze_of(&self, user: UserId) -> Option<Duration> {
        self.subscribers
            .lock()
            .await
            .get(&user)
            .and_then(|s| s.snooze.current())
    }

    /// Active users ordered by id
    pub async fn active_users(&self) -> Vec<SubscriberInfo> {
        let subscribers = self.subscribers.lock().await;
        let mut users: Vec<SubscriberInfo> = subscribers
            .iter()
            .map(|(user, s)| SubscriberInfo {
                user: *user,
                snooze_minutes: s.snooze.current().map(|d| d.as_secs() / 60),
            })
            .collect();
        users.sort_by_key(|info| info.user);
        users
    }

    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    /// Unsubscribe everyone; used on process exit
    pub async fn shutdown(&self) {
        let mut subscribers = self.subscribers.lock().await;
        let count = subscribers.len();

        for (user, subscriber) in subscribers.drain() {
            self.retire(user, subscriber).await;
        }

        gauge!("co2_active_subscribers").set(0.0);
        info!("Registry shut down, {} subscriber(s) released", count);
    }

    async fn retire(&self, user: UserId, subscriber: Subscriber) {
        self.hub.unregister(subscriber.channel);
        subscriber.snooze.clear();
        subscriber.cancel.cancel();

        if let Err(e) = subscriber.task.await {
            if e.is_panic() {
                error!(%user, "Alert evaluator panicked: {}", e);
            }
        }
    }
}
