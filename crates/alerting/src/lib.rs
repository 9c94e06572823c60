//! Alerting System
//!
//! Fans CO2 readings out to every subscribed user and turns each user's
//! stream into rate-limited threshold notifications.
//!
//! ```text
//! source ──► BroadcastHub ──┬──► channel ──► AlertEvaluator ──► Notifier
//!                           └──► channel ──► AlertEvaluator ──► Notifier
//! ```
//!
//! [`SubscriberRegistry`] owns the per-user channels and evaluator tasks and
//! is the only entry point for subscribe, unsubscribe and snooze.

mod config;
mod error;
mod evaluator;
mod hub;
mod notifier;
mod registry;
mod user;

pub use config::{AlertConfig, AlertKind};
pub use error::{ConfigError, NotifyError};
pub use evaluator::{AlertEvaluator, SnoozeCell};
pub use hub::{BroadcastHub, ChannelId, ReadingSender};
pub use notifier::{Alert, LogNotifier, MemoryNotifier, Notifier, SentAlert};
pub use registry::{SubscriberInfo, SubscriberRegistry};
pub use user::UserId;
