//! Time zone and calendar helpers.
//!
//! - [`parse_ts_to_utc`]: parse RFC-3339 timestamps with an explicit offset and convert to UTC.
//! - [`to_rfc3339_millis`]: the storage format for every timestamp column.
//! - [`parse_tz`]: resolve an IANA zone name used for display.
//! - [`session_before`]: the weekday session preceding a calendar date.
//!
//! All database writes are RFC-3339 UTC strings. Local zones only affect how
//! times are rendered in signal messages.

use anyhow::Context;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse_tz(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("bad tz: {name}"))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").with_context(|| format!("bad date: {s}"))
}

/// The day before `date`, moved back to Friday when it falls on a weekend.
///
/// Market holidays are not considered.
pub fn session_before(date: NaiveDate) -> NaiveDate {
    let prev = date - Days::new(1);
    match prev.weekday() {
        Weekday::Sun => prev - Days::new(2),
        Weekday::Sat => prev - Days::new(1),
        _ => prev,
    }
}
