//! Mock Reading Source
//!
//! Replays a fixed script, or synthesizes a slow indoor CO2 curve when no
//! script is given, so the pipeline can run without a sensor attached.

use crate::error::FeedError;
use crate::reading::Reading;
use crate::source::ReadingSource;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::info;

/// Synthetic curve bounds (ppm)
const DEMO_LOW: f64 = 380.0;
const DEMO_HIGH: f64 = 1400.0;
const DEMO_STEP: f64 = 20.0;

/// Mock sensor for tests and demos (no hardware required)
pub struct MockSource {
    script: Option<VecDeque<f64>>,
    interval: Duration,
    next_seq: u64,
}

impl MockSource {
    /// Replay the given values once, then end the stream
    pub fn scripted(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: Some(values.into_iter().collect()),
            interval: Duration::ZERO,
            next_seq: 0,
        }
    }

    /// Endless synthetic curve rising and falling between fresh and stale air
    pub fn demo() -> Self {
        info!("Creating mock CO2 source");
        Self {
            script: None,
            interval: Duration::from_secs(1),
            next_seq: 0,
        }
    }

    fn demo_value(seq: u64) -> f64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let steps = ((DEMO_HIGH - DEMO_LOW) / DEMO_STEP) as u64;
        let phase = seq % (2 * steps);
        let ramp = if phase < steps { phase } else { 2 * steps - phase };

        // Deterministic jitter of +/- 10 ppm
        let mut hasher = DefaultHasher::new();
        seq.hash(&mut hasher);
        let jitter = (hasher.finish() % 21) as f64 - 10.0;

        (DEMO_LOW + ramp as f64 * DEMO_STEP + jitter).max(0.0)
    }
}

impl ReadingSource for MockSource {
    async fn next_reading(&mut self) -> Result<Option<Reading>, FeedError> {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }

        let value = match self.script.as_mut() {
            Some(script) => match script.pop_front() {
                Some(value) => value,
                None => return Ok(None),
            },
            None => Self::demo_value(self.next_seq),
        };

        let reading = Reading::new(value, self.next_seq);
        self.next_seq += 1;
        Ok(Some(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replay() {
        let mut src = MockSource::scripted([300.0, 1200.0]);
        assert_eq!(src.next_reading().await.unwrap(), Some(Reading::new(300.0, 0)));
        assert_eq!(src.next_reading().await.unwrap(), Some(Reading::new(1200.0, 1)));
        assert_eq!(src.next_reading().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_stays_in_band() {
        let mut src = MockSource::demo();
        for _ in 0..200 {
            let reading = src.next_reading().await.unwrap().unwrap();
            assert!(reading.value >= DEMO_LOW - 10.0);
            assert!(reading.value <= DEMO_HIGH + 10.0);
        }
    }
}
