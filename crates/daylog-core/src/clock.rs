//! Timestamp provider.
//!
//! File names use the UTC calendar date (`2024-03-01`) and records use the
//! UTC instant with millisecond precision (`2024-03-01T12:34:56.789Z`).
//! The logger reads time only through a [`Clock`] so that tests can
//! simulate date changes.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    instant: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(start),
        }
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock() = instant;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut instant = self.instant.lock();
        *instant += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock()
    }
}

/// `YYYY-MM-DD` for the given instant.
pub fn format_date(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

/// ISO 8601 with milliseconds and a `Z` suffix.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Today's UTC date, used for log file names.
pub fn today() -> String {
    format_date(&SystemClock.now())
}

/// The current UTC instant, used for record timestamps.
pub fn now() -> String {
    format_timestamp(&SystemClock.now())
}
