//! week.rs — Monday-anchored week bucketing.
//!
//! Weeks run Monday 00:00:00.000 through Sunday 23:59:59.999, UTC as the
//! reference clock. The week identifier is `YYYY-Www` built from the ISO
//! week-numbering year, so lexical ordering of identifiers matches
//! chronological ordering ("2026-W53" < "2027-W01").

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

/// Monday 00:00:00.000 of the week containing `at`.
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let back = Duration::days(at.weekday().num_days_from_monday() as i64);
    let monday = (at - back).date_naive();
    Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN))
}

/// Sunday 23:59:59.999 of the week containing `at`.
pub fn week_end(at: DateTime<Utc>) -> DateTime<Utc> {
    week_start(at) + Duration::days(7) - Duration::milliseconds(1)
}

/// Sortable identifier of the week containing `at`, e.g. "2026-W32".
pub fn week_id(at: DateTime<Utc>) -> String {
    let iso = at.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

/// Identifier of the week exactly one before the week containing `at`.
pub fn previous_week_id(at: DateTime<Utc>) -> String {
    week_id(week_start(at) - Duration::days(7))
}

/// Identifier of the week containing the current instant.
pub fn current_week_id() -> String {
    week_id(Utc::now())
}
