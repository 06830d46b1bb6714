//! Time management for path resolution
//!
//! Every run stamps wall-clock time into the output path and filename.
//! The clock is an explicit seam so that rendering is reproducible in
//! tests: given a fixed reading, the same request always resolves to the
//! same path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of the `timestamp` template argument and the output filename
/// suffix: `YYYYMMDDHHMMSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of wall-clock readings
///
/// Production code uses [`SystemClock`]; tests use [`FixedClock`] to pin
/// the reading.
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use notebook_runner_core_rs::{Clock, FixedClock};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap());
/// assert_eq!(clock.now().to_rfc3339(), "2024-03-09T14:30:05+00:00");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Create a clock pinned to `instant`
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// The four time-derived template arguments, taken from a single clock
/// reading
///
/// Derived once per resolution so `timestamp`, `year`, `month` and `day`
/// are mutually consistent even when the call straddles midnight.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use notebook_runner_core_rs::TimeParts;
///
/// let parts = TimeParts::at(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap());
/// assert_eq!(parts.timestamp(), "20240309143005");
/// assert_eq!(parts.year(), "2024");
/// assert_eq!(parts.month(), "03");
/// assert_eq!(parts.day(), "09");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    /// `YYYYMMDDHHMMSS`
    timestamp: String,
    /// `YYYY`
    year: String,
    /// `MM`, zero-padded
    month: String,
    /// `DD`, zero-padded
    day: String,
}

impl TimeParts {
    /// Derive the parts from an instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            timestamp: instant.format(TIMESTAMP_FORMAT).to_string(),
            year: instant.format("%Y").to_string(),
            month: instant.format("%m").to_string(),
            day: instant.format("%d").to_string(),
        }
    }

    /// Derive the parts from a clock's current reading
    pub fn now(clock: &dyn Clock) -> Self {
        Self::at(clock.now())
    }

    /// The `YYYYMMDDHHMMSS` timestamp
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The four-digit year
    pub fn year(&self) -> &str {
        &self.year
    }

    /// The zero-padded month
    pub fn month(&self) -> &str {
        &self.month
    }

    /// The zero-padded day of month
    pub fn day(&self) -> &str {
        &self.day
    }
}
