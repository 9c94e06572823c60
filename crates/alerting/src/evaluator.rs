//! Per-Subscriber Alert Evaluator
//!
//! Each active subscriber owns one evaluator task draining its private
//! channel in arrival order:
//!
//! 1. A pending snooze suspends evaluation for the snooze duration and the
//!    reading that found it is discarded.
//! 2. A reading at or above `warn` sends a bad alert and suspends for the
//!    alert cooldown.
//! 3. A reading at or below `good` sends a good alert and suspends for the
//!    good cooldown.
//! 4. Anything in between is ignored without suspension.
//!
//! Every wait selects against the subscriber's cancellation token, so
//! unsubscribing stops the task mid-cooldown.

use crate::config::{AlertConfig, AlertKind};
use crate::notifier::{Alert, Notifier};
use crate::user::UserId;
use co2_feed::Reading;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stand-in deadline for snoozes too long to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Shared, overwritable snooze duration for one subscriber
#[derive(Debug, Clone)]
pub struct SnoozeCell {
    inner: Arc<watch::Sender<Option<Duration>>>,
}

impl SnoozeCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Arc::new(tx) }
    }

    /// Set the snooze from a minute count; zero or negative clears it
    pub fn set_minutes(&self, minutes: i64) -> Option<Duration> {
        let duration = u64::try_from(minutes)
            .ok()
            .map(|m| Duration::from_secs(m.saturating_mul(60)));
        self.set(duration)
    }

    /// Overwrite the snooze. A zero duration counts as cleared.
    pub fn set(&self, duration: Option<Duration>) -> Option<Duration> {
        let duration = duration.filter(|d| !d.is_zero());
        self.inner.send_replace(duration);
        duration
    }

    pub fn clear(&self) {
        self.inner.send_replace(None);
    }

    /// Snooze currently pending, if any
    pub fn current(&self) -> Option<Duration> {
        *self.inner.borrow()
    }

    fn watch(&self) -> watch::Receiver<Option<Duration>> {
        self.inner.subscribe()
    }
}

impl Default for SnoozeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Threshold state machine for a single subscriber
pub struct AlertEvaluator<N> {
    user: UserId,
    config: Arc<AlertConfig>,
    notifier: Arc<N>,
    readings: mpsc::UnboundedReceiver<Reading>,
    snooze: SnoozeCell,
    snooze_rx: watch::Receiver<Option<Duration>>,
    cancel: CancellationToken,
}

impl<N: Notifier> AlertEvaluator<N> {
    pub fn new(
        user: UserId,
        config: Arc<AlertConfig>,
        notifier: Arc<N>,
        readings: mpsc::UnboundedReceiver<Reading>,
        snooze: SnoozeCell,
        cancel: CancellationToken,
    ) -> Self {
        let snooze_rx = snooze.watch();
        Self {
            user,
            config,
            notifier,
            readings,
            snooze,
            snooze_rx,
            cancel,
        }
    }

    /// Run until the channel closes or the token is cancelled
    pub async fn run(mut self) {
        info!(user = %self.user, "Alert evaluator started");

        while let Some(reading) = self.next_reading().await {
            let pending = *self.snooze_rx.borrow_and_update();
            if let Some(snooze) = pending {
                debug!(user = %self.user, "Discarding reading #{} under snooze", reading.seq);
                if !self.snooze_for(snooze).await {
                    break;
                }
                continue;
            }

            let Some(kind) = self.config.classify(reading.value) else {
                continue;
            };

            self.notify(kind, reading.value).await;

            let cooldown = self.config.cooldown_for(kind);
            debug!(user = %self.user, "Cooling down for {:?}", cooldown);
            if !self.pause(cooldown).await {
                break;
            }
        }

        info!(user = %self.user, "Alert evaluator stopped");
    }

    async fn next_reading(&mut self) -> Option<Reading> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            reading = self.readings.recv() => reading,
        }
    }

    /// Returns false when cancelled before the pause elapsed
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    /// Sleep out a snooze, following changes made while it runs.
    ///
    /// Clearing the snooze ends the wait; a new value restarts it.
    async fn snooze_for(&mut self, duration: Duration) -> bool {
        info!(user = %self.user, "Snoozed for {:?}", duration);
        let mut deadline = deadline_after(duration);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                changed = self.snooze_rx.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                    let updated = *self.snooze_rx.borrow_and_update();
                    match updated {
                        Some(updated) => {
                            info!(user = %self.user, "Snooze changed to {:?}", updated);
                            deadline = deadline_after(updated);
                        }
                        None => {
                            info!(user = %self.user, "Snooze cleared early");
                            return true;
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    self.snooze.clear();
                    debug!(user = %self.user, "Snooze elapsed");
                    return true;
                }
            }
        }
    }

    async fn notify(&mut self, kind: AlertKind, value: f64) {
        if self.cancel.is_cancelled() {
            return;
        }

        let alert = Alert::new(kind, value);
        warn!(user = %self.user, value, "Sending {} alert", kind);

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(user = %self.user, "Alert delivery abandoned on unsubscribe");
                return;
            }
            sent = self.notifier.send(self.user, &alert) => sent,
        };

        match sent {
            Ok(()) => counter!("co2_alerts_sent_total", "level" => kind.as_str()).increment(1),
            Err(e) => {
                warn!(user = %self.user, error = %e, "Alert delivery failed");
                counter!("co2_alerts_failed_total").increment(1);
            }
        }
    }
}

fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration).unwrap_or(now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MemoryNotifier;
    use tokio::task::JoinHandle;

    const MINUTE: Duration = Duration::from_secs(60);

    type Log = Vec<(AlertKind, f64, u64)>;

    struct Harness {
        tx: mpsc::UnboundedSender<Reading>,
        snooze: SnoozeCell,
        cancel: CancellationToken,
        sink: Arc<MemoryNotifier>,
        task: JoinHandle<()>,
        start: Instant,
        seq: u64,
    }

    impl Harness {
        fn spawn() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let snooze = SnoozeCell::new();
            let cancel = CancellationToken::new();
            let sink = Arc::new(MemoryNotifier::new());
            let evaluator = AlertEvaluator::new(
                UserId(7),
                Arc::new(AlertConfig::default()),
                sink.clone(),
                rx,
                snooze.clone(),
                cancel.clone(),
            );
            Self {
                tx,
                snooze,
                cancel,
                sink,
                task: tokio::spawn(evaluator.run()),
                start: Instant::now(),
                seq: 0,
            }
        }

        fn push(&mut self, value: f64) {
            self.tx.send(Reading::new(value, self.seq)).unwrap();
            self.seq += 1;
        }

        fn log(&self) -> Log {
            log_of(&self.sink, self.start)
        }

        /// Close the channel and wait for the evaluator to drain it
        async fn finish(self) -> Log {
            let Harness { tx, task, sink, start, .. } = self;
            drop(tx);
            task.await.unwrap();
            log_of(&sink, start)
        }
    }

    /// (kind, value, whole minutes since start) per delivered alert
    fn log_of(sink: &MemoryNotifier, start: Instant) -> Log {
        sink.sent()
            .iter()
            .map(|s| (s.alert.kind, s.alert.value, (s.at - start).as_secs() / 60))
            .collect()
    }

    /// Let the evaluator run without reaching any cooldown deadline
    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_worked_example() {
        let mut h = Harness::spawn();
        for value in [300.0, 1200.0, 500.0, 900.0] {
            h.push(value);
        }

        assert_eq!(
            h.finish().await,
            vec![(AlertKind::Good, 300.0, 0), (AlertKind::Bad, 1200.0, 20)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_band_does_not_suspend() {
        let mut h = Harness::spawn();
        for value in [500.0, 600.0, 999.0, 1000.0] {
            h.push(value);
        }

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1000.0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_alert_cooldown() {
        let mut h = Harness::spawn();
        h.push(1200.0);
        settle().await;
        assert_eq!(h.log().len(), 1);

        sleep(5 * MINUTE).await;
        h.push(1300.0);
        settle().await;
        assert_eq!(h.log().len(), 1, "no alert while cooling down");

        assert_eq!(
            h.finish().await,
            vec![(AlertKind::Bad, 1200.0, 0), (AlertKind::Bad, 1300.0, 10)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snooze_discards_trigger_reading() {
        let mut h = Harness::spawn();
        let snooze = h.snooze.clone();
        assert_eq!(snooze.set_minutes(30), Some(30 * MINUTE));

        h.push(1200.0);
        h.push(1300.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1300.0, 30)]);
        assert_eq!(snooze.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_snooze_clears() {
        let mut h = Harness::spawn();
        h.snooze.set_minutes(30);
        assert_eq!(h.snooze.set_minutes(0), None);
        h.snooze.set_minutes(15);
        assert_eq!(h.snooze.set_minutes(-5), None);

        h.push(1200.0);
        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1200.0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_snooze_mid_sleep_resumes() {
        let mut h = Harness::spawn();
        h.snooze.set_minutes(30);
        h.push(1200.0);
        settle().await;

        sleep(5 * MINUTE).await;
        h.snooze.set_minutes(0);
        settle().await;
        h.push(1300.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1300.0, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwriting_snooze_mid_sleep_restarts() {
        let mut h = Harness::spawn();
        h.snooze.set_minutes(30);
        h.push(1200.0);
        settle().await;

        sleep(10 * MINUTE).await;
        h.snooze.set_minutes(60);
        h.push(1300.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1300.0, 70)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_cooldown() {
        let mut h = Harness::spawn();
        h.push(1200.0);
        settle().await;
        h.push(1300.0);

        h.cancel.cancel();
        let start = h.start;
        let sink = h.sink.clone();
        h.task.await.unwrap();

        assert!(start.elapsed() < MINUTE, "evaluator must stop without waiting out the cooldown");
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_keeps_running() {
        let mut h = Harness::spawn();
        h.sink.set_failing(true);
        h.push(1200.0);
        settle().await;
        assert_eq!(h.sink.attempts(), 1);
        assert!(h.sink.sent().is_empty());

        h.sink.set_failing(false);
        sleep(11 * MINUTE).await;
        h.push(350.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Good, 350.0, 11)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_snooze_can_be_cleared() {
        let mut h = Harness::spawn();
        assert!(h.snooze.set_minutes(i64::MAX).is_some());
        h.push(1200.0);
        settle().await;
        assert!(!h.task.is_finished());

        sleep(MINUTE).await;
        h.snooze.clear();
        settle().await;
        h.push(1300.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1300.0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_before_snooze_starts_is_honoured() {
        let mut h = Harness::spawn();
        h.snooze.set_minutes(30);
        h.snooze.clear();
        h.push(1200.0);

        assert_eq!(h.finish().await, vec![(AlertKind::Bad, 1200.0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_delivery() {
        let mut h = Harness::spawn();
        h.sink.set_latency(30 * MINUTE);
        h.push(1200.0);
        settle().await;
        assert_eq!(h.sink.attempts(), 1);

        h.cancel.cancel();
        let start = h.start;
        let sink = h.sink.clone();
        h.task.await.unwrap();

        assert!(start.elapsed() < MINUTE, "cancel must not wait for the send");
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_deadline_after_saturates() {
        let now = Instant::now();
        assert!(deadline_after(Duration::MAX) > now + Duration::from_secs(86_400 * 365));
        assert!(deadline_after(Duration::ZERO).saturating_duration_since(now) < MINUTE);
    }

    #[test]
    fn test_snooze_cell() {
        let cell = SnoozeCell::new();
        assert_eq!(cell.current(), None);
        assert_eq!(cell.set_minutes(5), Some(Duration::from_secs(300)));
        assert_eq!(cell.current(), Some(Duration::from_secs(300)));
        assert_eq!(cell.set(Some(Duration::ZERO)), None);
        assert_eq!(cell.current(), None);
        assert_eq!(cell.set_minutes(i64::MIN), None);
    }
}
