//! Sensor Feed Pump
//!
//! Moves readings from a [`ReadingSource`] into the broadcast hub. Bad
//! lines are dropped; connection failures reopen the source after a delay.

use alerting::BroadcastHub;
use co2_feed::{FeedError, ReadingSource};
use metrics::{counter, gauge};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keep a source open and publishing until cancelled
pub async fn run_feed<S, F, Fut>(
    mut open: F,
    hub: Arc<BroadcastHub>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) where
    S: ReadingSource,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, FeedError>>,
{
    info!("Sensor feed started");

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = open() => opened,
        };

        match opened {
            Ok(mut source) => pump(&mut source, &hub, &cancel).await,
            Err(e) => error!("Failed to open sensor feed: {}", e),
        }

        if cancel.is_cancelled() {
            break;
        }

        warn!("Reopening sensor feed in {:?}", reconnect_delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    info!("Sensor feed stopped");
}

/// Publish readings until the source ends, fails or the token is cancelled
pub async fn pump<S: ReadingSource>(source: &mut S, hub: &BroadcastHub, cancel: &CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = source.next_reading() => next,
        };

        match next {
            Ok(Some(reading)) => {
                info!("CO2: {}", reading.value);
                counter!("co2_readings_total").increment(1);
                gauge!("co2_last_reading_ppm").set(reading.value);
                hub.publish(reading);
            }
            Ok(None) => {
                warn!("Sensor feed ended");
                return;
            }
            Err(e) if e.is_bad_reading() => {
                warn!("Dropping reading: {}", e);
                counter!("co2_readings_dropped_total").increment(1);
            }
            Err(e) => {
                error!("Sensor feed failed: {}", e);
                return;
            }
        }
    }
}
