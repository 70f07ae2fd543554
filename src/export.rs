//! RFC 5545 export of confirmed events.
//!
//! Events without a time become all-day `VALUE=DATE` entries. Events whose
//! sanitized time reads as a clock time (`3:00PM`, `10am`, `14:30`) become
//! floating one-hour entries, so they show at that wall-clock time in
//! whatever zone the calendar app uses. Undated events cannot be placed on a
//! calendar and are skipped.

use crate::error::SyllabusError;
use crate::event::{CalendarEvent, Frequency, Priority};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use icalendar::{Calendar, Component, EventLike, Property, ValueType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?:(A|P)M?)?$").unwrap());

/// Read a sanitized time string as a clock time.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let upper = raw.trim().to_uppercase();
    let caps = RE_CLOCK.captures(&upper)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;

    match caps.get(3).map(|m| m.as_str()) {
        Some("A") => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour == 12 {
                hour = 0;
            }
        }
        Some(_) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            if hour != 12 {
                hour += 12;
            }
        }
        None => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// RFC 5545 PRIORITY: 1 is highest, 9 lowest.
fn ics_priority(priority: Priority) -> u8 {
    match priority {
        Priority::High => 1,
        Priority::Medium => 5,
        Priority::Low => 9,
    }
}

fn rrule(event: &CalendarEvent, timed: bool) -> Option<String> {
    if !event.is_recurring {
        return None;
    }
    let rec = event.recurrence.as_ref()?;
    let freq = match rec.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly => "MONTHLY",
    };
    let mut rule = format!("FREQ={freq}");
    if rec.frequency == Frequency::Weekly && !rec.days.is_empty() {
        let days: Vec<_> = rec.days.iter().map(|d| d.ics_code()).collect();
        rule.push_str(&format!(";BYDAY={}", days.join(",")));
    }
    if let Some(end) = rec.end_date {
        // UNTIL must match the value type of DTSTART.
        if timed {
            rule.push_str(&format!(";UNTIL={}T235959", end.format("%Y%m%d")));
        } else {
            rule.push_str(&format!(";UNTIL={}", end.format("%Y%m%d")));
        }
    }
    Some(rule)
}

fn add_date(ics_event: &mut icalendar::Event, name: &str, date: NaiveDate) {
    let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
    prop.append_parameter(ValueType::Date);
    ics_event.append_property(prop);
}

fn add_floating(ics_event: &mut icalendar::Event, name: &str, at: NaiveDateTime) {
    ics_event.add_property(name, at.format("%Y%m%dT%H%M%S").to_string());
}

fn to_ics_event(event: &CalendarEvent, date: NaiveDate, dtstamp: &str) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.id);
    ics_event.summary(&event.title);
    ics_event.add_property("DTSTAMP", dtstamp);

    let start_time = event.time.as_deref().and_then(parse_clock_time);
    match start_time {
        Some(time) => {
            let start = date.and_time(time);
            add_floating(&mut ics_event, "DTSTART", start);
            add_floating(&mut ics_event, "DTEND", start + Duration::hours(1));
        }
        None => {
            add_date(&mut ics_event, "DTSTART", date);
            add_date(&mut ics_event, "DTEND", date + Duration::days(1));
        }
    }

    if let Some(ref desc) = event.description {
        ics_event.description(desc);
    }
    if let Some(ref loc) = event.location {
        ics_event.location(loc);
    }
    ics_event.add_property("CATEGORIES", event.event_type.as_str().to_uppercase());
    ics_event.add_property("PRIORITY", ics_priority(event.priority).to_string());

    if let Some(code) = event.course_code.as_deref() {
        ics_event.add_property("X-COURSE-CODE", code);
    }
    if let Some(rule) = rrule(event, start_time.is_some()) {
        ics_event.add_property("RRULE", rule);
    }

    ics_event.done()
}

/// Serialize events to one VCALENDAR document.
pub fn export_ics(events: &[CalendarEvent]) -> String {
    let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut cal = Calendar::new();
    let mut exported = 0;

    for event in events {
        let Some(date) = event.date else {
            warn!("Skipping '{}' in export: no date", event.title);
            continue;
        };
        cal.push(to_ics_event(event, date, &dtstamp));
        exported += 1;
    }

    info!("Exported {}/{} events to iCalendar", exported, events.len());
    cal.done().to_string()
}

/// Write an `.ics` file atomically.
pub async fn write_ics(path: &Path, events: &[CalendarEvent]) -> Result<(), SyllabusError> {
    let content = export_ics(events);
    let write_err = |source| SyllabusError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp = path.with_extension("ics.tmp");
    tokio::fs::write(&tmp, content).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DayOfWeek, EventType, Recurrence};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn midterm() -> CalendarEvent {
        let mut e = CalendarEvent::new("Midterm", EventType::Test);
        e.date = Some(ymd(2024, 3, 15));
        e.location = Some("Room 101".into());
        e
    }

    #[test]
    fn clock_times() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0);
        assert_eq!(parse_clock_time("3:00PM"), t(15, 0));
        assert_eq!(parse_clock_time("10am"), t(10, 0));
        assert_eq!(parse_clock_time("12:30am"), t(0, 30));
        assert_eq!(parse_clock_time("12pm"), t(12, 0));
        assert_eq!(parse_clock_time("14:30"), t(14, 30));
        assert_eq!(parse_clock_time("3p"), t(15, 0));
        assert_eq!(parse_clock_time("13pm"), None);
        assert_eq!(parse_clock_time("a3:00pm"), None);
        assert_eq!(parse_clock_time("25:00"), None);
    }

    #[test]
    fn bare_m_suffix_is_not_a_time() {
        assert_eq!(parse_clock_time("3M"), None);
        assert_eq!(parse_clock_time("3:00M"), None);
        assert_eq!(parse_clock_time("3:00AMM"), None);
    }

    #[test]
    fn all_day_event() {
        let ics = export_ics(&[midterm()]);
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("SUMMARY:Midterm"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20240315"));
        assert!(ics.contains("DTEND;VALUE=DATE:20240316"));
        assert!(ics.contains("LOCATION:Room 101"));
        assert!(ics.contains("CATEGORIES:TEST"));
        assert!(ics.contains("PRIORITY:1"));
    }

    #[test]
    fn timed_event_is_floating_one_hour() {
        let mut e = midterm();
        e.time = Some("3:00PM".into());
        let ics = export_ics(&[e]);
        assert!(ics.contains("DTSTART:20240315T150000"));
        assert!(ics.contains("DTEND:20240315T160000"));
    }

    #[test]
    fn recurring_event_has_rrule() {
        let mut e = CalendarEvent::new("Lecture", EventType::Meeting);
        e.date = Some(ymd(2024, 1, 17));
        e.is_recurring = true;
        e.recurrence = Some(Recurrence {
            frequency: Frequency::Weekly,
            days: vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
            end_date: Some(ymd(2024, 4, 24)),
        });
        let ics = export_ics(&[e]);
        assert!(ics.contains("RRULE:FREQ=WEEKLY;BYDAY=MO,WE;UNTIL=20240424"));
        assert!(ics.contains("PRIORITY:5"));
    }

    #[test]
    fn undated_events_are_skipped() {
        let undated = CalendarEvent::new("TBD", EventType::Assignment);
        let ics = export_ics(&[undated, midterm()]);
        assert!(!ics.contains("SUMMARY:TBD"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/cal.ics");
        write_ics(&path, &[midterm()]).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("UID:"));
        assert!(!dir.path().join("out/cal.ics.tmp").exists());
    }
}
