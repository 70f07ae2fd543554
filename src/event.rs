//! Calendar event domain types.
//!
//! [`CalendarEvent`] is the canonical, normalized record. It is produced by
//! [`crate::pipeline::normalize`], adjusted by the user through
//! [`EventEdit`] operations, and persisted through
//! [`crate::store::CalendarEventStore`]. Serialised field names are camelCase
//! to match the persisted records.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of event kinds a course document can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Test,
    /// Fallback for missing or unrecognised types.
    #[default]
    Assignment,
    Meeting,
    OfficeHours,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Test,
        EventType::Assignment,
        EventType::Meeting,
        EventType::OfficeHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Test => "test",
            EventType::Assignment => "assignment",
            EventType::Meeting => "meeting",
            EventType::OfficeHours => "office_hours",
        }
    }

    /// Parse a type label. Case, surrounding whitespace, and `-`/space
    /// separators are tolerated (`"Office Hours"` → `OfficeHours`).
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        EventType::ALL.into_iter().find(|t| t.as_str() == key)
    }

    /// Priority assigned when the model does not supply a valid one.
    pub fn default_priority(&self) -> Priority {
        match self {
            EventType::Test => Priority::High,
            EventType::Assignment | EventType::Meeting => Priority::Medium,
            EventType::OfficeHours => Priority::Low,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

/// Day names serialised in full (`"Wednesday"`), as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Two-letter RFC 5545 `BYDAY` code.
    pub fn ics_code(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MO",
            DayOfWeek::Tuesday => "TU",
            DayOfWeek::Wednesday => "WE",
            DayOfWeek::Thursday => "TH",
            DayOfWeek::Friday => "FR",
            DayOfWeek::Saturday => "SA",
            DayOfWeek::Sunday => "SU",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Repetition pattern for a recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub frequency: Frequency,
    #[serde(default)]
    pub days: Vec<DayOfWeek>,
    /// Required before a recurring event can be confirmed.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Course information inferred once per uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub class_location: Option<String>,
    pub course_title: Option<String>,
    pub course_code: Option<String>,
}

/// A normalized calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    /// Local calendar day; `None` when the model's date was unusable and the
    /// user has not filled one in yet.
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub priority: Priority,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub course_code: Option<String>,
    pub course_title: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

impl CalendarEvent {
    /// A fresh event with a random id and type-derived priority.
    pub fn new(title: impl Into<String>, event_type: EventType) -> Self {
        Self {
            id: new_event_id(),
            title: title.into(),
            date: None,
            event_type,
            priority: event_type.default_priority(),
            time: None,
            location: None,
            description: None,
            course_code: None,
            course_title: None,
            is_recurring: false,
            recurrence: None,
        }
    }
}

/// Ids are random, never derived from content, so uploading the same
/// document twice yields distinct events.
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A closed set of user edits applied during review or in the edit dialog.
///
/// Applied with [`crate::review::apply_edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEdit {
    SetTitle(String),
    SetDate(Option<NaiveDate>),
    SetTime(Option<String>),
    SetType(EventType),
    SetPriority(Priority),
    SetLocation(Option<String>),
    SetDescription(Option<String>),
    SetRecurring(bool),
    SetFrequency(Frequency),
    SetRecurrenceDays(Vec<DayOfWeek>),
    SetRecurrenceEnd(Option<NaiveDate>),
}
