//! Processing-time source
//!
//! The engine never reads the wall clock directly. It asks an injected
//! [`Clock`], so tests can pin "now" and payment dates that are missing or
//! unparsable fall back to a deterministic value.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::cell::Cell;

/// Source of the current processing time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually controlled time
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use lending_core::core::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
/// clock.advance(Duration::days(7));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Parse a payment date
///
/// Accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp. Returns
/// `None` for anything else; callers substitute the processing time.
///
/// # Example
/// ```
/// use lending_core::core::clock::parse_payment_date;
///
/// assert!(parse_payment_date("2024-02-29").is_some());
/// assert!(parse_payment_date("2024-02-30").is_none());
/// assert!(parse_payment_date("").is_none());
/// ```
pub fn parse_payment_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
