//! CO2 Sensor Feed
//!
//! This crate reads the CO2 sensor's serial line protocol (one decimal
//! value per line) and turns it into validated [`Reading`]s. A scripted
//! [`MockSource`] stands in for the hardware in tests and demos.

mod error;
mod mock;
mod reading;
mod serial;
mod source;
mod validator;

pub use error::FeedError;
pub use mock::MockSource;
pub use reading::{parse_reading, Reading};
pub use serial::{SerialConfig, SerialSource};
pub use source::ReadingSource;
pub use validator::{ValidationConfig, Validator};
