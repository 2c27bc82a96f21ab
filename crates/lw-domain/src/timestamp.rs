//! Millisecond timestamps as stored in sidecar records.
//!
//! Records carry modification times as epoch milliseconds. Older records only
//! have a date-only string (`yyyy-MM-dd`); it is read as midnight UTC and is
//! never written back on its own.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

const LEGACY_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[allow(clippy::cast_possible_truncation)]
pub fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Drops sub-millisecond precision so that filesystem times compare exactly
/// with recorded ones.
pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    from_millis(to_millis(at)).unwrap_or(at)
}

pub fn format_legacy_date(at: OffsetDateTime) -> String {
    at.date()
        .format(LEGACY_DATE)
        .unwrap_or_else(|_| at.date().to_string())
}

pub fn parse_legacy_date(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let date = Date::parse(raw.trim(), LEGACY_DATE)?;
    Ok(date.midnight().assume_utc())
}
