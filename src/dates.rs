//! Calendar-date canonicalisation.
//!
//! Events are all about *days*: "Midterm on March 15" must stay on March 15
//! for every user regardless of timezone. Dates are therefore held as
//! [`NaiveDate`] and never round-tripped through UTC instants. When a date has
//! to be anchored to an instant, it is anchored at local noon: noon sits at
//! least 10 hours away from either midnight for every offset between UTC-12
//! and UTC+14, so no offset conversion can move it to a neighbouring day.

use crate::event::DayOfWeek;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical wire format for a calendar day.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// Date-only formats accepted from the model, tried in order.
///
/// US month-first formats come before day-first ones; course documents this
/// tool targets are overwhelmingly US-style.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").unwrap());

/// Parse a free-form date string into a calendar day.
///
/// Returns `None` for anything that cannot be read unambiguously; callers
/// decide what a missing date means.
///
/// Date-times carrying an offset (`2024-03-15T00:00:00-05:00`) keep the day
/// *as written in their own offset*: converting to UTC first would move
/// late-evening deadlines onto the next day.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }

    let cleaned = RE_ORDINAL.replace_all(trimmed, "$1");
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(date);
        }
    }

    None
}

/// Format a day in the canonical `YYYY-MM-DD` form.
pub fn canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_FORMAT).to_string()
}

/// Anchor a calendar day at 12:00 local time in `tz`.
///
/// The pipeline itself works on `NaiveDate`. This and [`canonical_local`] are
/// for hosts that must turn a day into an instant (a date picker, a remote
/// store keyed by timestamp) and read it back without shifting the day.
///
/// Falls back to the earliest valid instant if noon is skipped or repeated
/// by a DST transition in `tz`.
pub fn local_noon<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0)?);
    tz.from_local_datetime(&noon).earliest()
}

/// Canonical day string of an instant, read in the instant's own timezone.
pub fn canonical_local<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    canonical(instant.date_naive())
}

pub fn weekday(date: NaiveDate) -> DayOfWeek {
    date.weekday().into()
}
