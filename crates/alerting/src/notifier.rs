//! Notification Sink Seam

use crate::config::AlertKind;
use crate::error::NotifyError;
use crate::user::UserId;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// A threshold crossing to be pushed to one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    /// Reading that triggered the alert (ppm)
    pub value: f64,
}

impl Alert {
    pub fn new(kind: AlertKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// Human-readable push text
    pub fn message(&self) -> String {
        match self.kind {
            AlertKind::Bad => format!("🔥 CO2 BAD {}", self.value),
            AlertKind::Good => format!("🌍 CO2 GOOD {}", self.value),
        }
    }
}

/// Push-message delivery keyed by user id.
///
/// Implementations must not block indefinitely; a failed send is reported
/// and the evaluator moves on.
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, user: UserId, alert: &Alert) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Sink that only logs, used when no push transport is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, user: UserId, alert: &Alert) -> Result<(), NotifyError> {
        info!(%user, "{}", alert.message());
        Ok(())
    }
}

/// A delivered alert as recorded by [`MemoryNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentAlert {
    pub user: UserId,
    pub alert: Alert,
    pub at: Instant,
}

/// In-memory sink that records deliveries, with switchable failure and latency
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentAlert>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    latency: Mutex<Duration>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay each send by `latency` before it completes
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Successfully delivered alerts, oldest first
    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Delivered alerts for one user
    pub fn sent_to(&self, user: UserId) -> Vec<SentAlert> {
        self.sent().into_iter().filter(|s| s.user == user).collect()
    }

    /// Send attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for MemoryNotifier {
    async fn send(&self, user: UserId, alert: &Alert) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("memory sink offline".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentAlert { user, alert: *alert, at: Instant::now() });
        Ok(())
    }
}
