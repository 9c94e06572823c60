//! Reading Source Abstraction

use crate::error::FeedError;
use crate::reading::Reading;
use std::future::Future;

/// A producer of sensor readings.
///
/// `Ok(None)` marks the end of the stream (port closed, script exhausted).
/// Line-level problems surface as errors for which
/// [`FeedError::is_bad_reading`] is true; the caller drops that reading and
/// keeps pulling.
pub trait ReadingSource: Send {
    /// Wait for the next reading
    fn next_reading(&mut self) -> impl Future<Output = Result<Option<Reading>, FeedError>> + Send;
}
