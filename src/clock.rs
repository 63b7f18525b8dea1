//! Business timezone adapter.
//!
//! All scheduling decisions (send-day checks, ETA computation, digest
//! dates) are made in one fixed business zone injected at startup,
//! regardless of the caller's zone or any per-team timezone field.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};

/// Converts instants into the fixed business timezone. Pure; holds no
/// state beyond the configured offset.
#[derive(Debug, Clone, Copy)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The given instant on the business wall clock.
    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// The business-zone calendar date of the given instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date_naive()
    }

    /// Human-readable business-zone date, e.g. "Mon, Jan 05 2015".
    pub fn date_label(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%a, %b %d %Y").to_string()
    }
}

/// Weekday index of a local time, Monday = 0 .. Sunday = 6, matching the
/// convention of `Team::digest_days_sent`.
pub fn weekday_index(local: DateTime<FixedOffset>) -> u8 {
    local.weekday().num_days_from_monday() as u8
}

/// The same local date with hour and minute replaced by the configured
/// send time. Seconds are kept from `local`. Returns `None` only for
/// out-of-range components, which a parsed `NaiveTime` cannot produce.
pub fn at_local_time(
    local: DateTime<FixedOffset>,
    time: NaiveTime,
) -> Option<DateTime<FixedOffset>> {
    local
        .with_hour(time.hour())
        .and_then(|d| d.with_minute(time.minute()))
}
