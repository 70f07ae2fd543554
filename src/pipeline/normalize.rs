//! Event normalization: candidate → [`CalendarEvent`].
//!
//! Each candidate is repaired field by field; only a missing title drops it.
//! An unparseable date keeps the event with `date = None` so the user can
//! fill it in during review (the confirmation gate refuses undated events).
//! Output order matches input order.

use crate::dates;
use crate::error::CandidateRejected;
use crate::event::{new_event_id, CalendarEvent, DocumentMetadata, EventType, Priority};
use crate::pipeline::parse::ExtractedEventCandidate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_TIME_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9:apmAPM]").unwrap());

/// Outcome of normalizing one document's candidates.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub events: Vec<CalendarEvent>,
    /// Document metadata after filling gaps from event-level fields.
    pub metadata: DocumentMetadata,
    pub rejected: usize,
}

/// Normalize every candidate from one document, dropping the unrecoverable.
pub fn normalize(candidates: &[ExtractedEventCandidate], doc: &DocumentMetadata) -> Normalized {
    let metadata = resolve_document_metadata(candidates, doc);
    let mut events = Vec::with_capacity(candidates.len());
    let mut rejected = 0;

    for (i, candidate) in candidates.iter().enumerate() {
        match normalize_candidate(candidate, &metadata) {
            Ok(event) => events.push(event),
            Err(reason) => {
                rejected += 1;
                warn!("Dropping candidate #{}: {}", i + 1, reason);
            }
        }
    }

    debug!("Normalized {} events ({} rejected)", events.len(), rejected);
    Normalized {
        events,
        metadata,
        rejected,
    }
}

/// Course details are shared by every event of a document. When the model
/// only attached them to some events, the first value seen becomes the
/// document's.
pub fn resolve_document_metadata(
    candidates: &[ExtractedEventCandidate],
    doc: &DocumentMetadata,
) -> DocumentMetadata {
    DocumentMetadata {
        class_location: doc.class_location.clone(),
        course_title: doc
            .course_title
            .clone()
            .or_else(|| candidates.iter().find_map(|c| c.course_title.clone())),
        course_code: doc
            .course_code
            .clone()
            .or_else(|| candidates.iter().find_map(|c| c.course_code.clone())),
    }
}

/// Normalize a single candidate against its document's metadata.
pub fn normalize_candidate(
    candidate: &ExtractedEventCandidate,
    doc: &DocumentMetadata,
) -> Result<CalendarEvent, CandidateRejected> {
    let title = candidate
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(CandidateRejected::MissingTitle)?;

    let date = candidate.date.as_deref().and_then(|raw| {
        let parsed = dates::parse_date(raw);
        if parsed.is_none() {
            warn!("'{}': unparseable date {:?}, leaving it blank", title, raw);
        }
        parsed
    });

    let event_type = match candidate.event_type.as_deref() {
        Some(raw) => EventType::parse(raw).unwrap_or_else(|| {
            warn!("'{}': unknown type {:?}, using assignment", title, raw);
            EventType::Assignment
        }),
        None => EventType::Assignment,
    };

    let priority = candidate
        .priority
        .as_deref()
        .and_then(Priority::parse)
        .unwrap_or_else(|| event_type.default_priority());

    Ok(CalendarEvent {
        id: new_event_id(),
        title: title.to_string(),
        date,
        event_type,
        priority,
        time: candidate.time.as_deref().and_then(sanitize_time),
        location: candidate.location.clone().or_else(|| doc.class_location.clone()),
        description: candidate.description.clone(),
        course_code: candidate.course_code.clone().or_else(|| doc.course_code.clone()),
        course_title: candidate.course_title.clone().or_else(|| doc.course_title.clone()),
        is_recurring: false,
        recurrence: None,
    })
}

/// Keep only digits, `:` and the letters of am/pm. `"3:00 PM"` → `"3:00PM"`.
pub fn sanitize_time(raw: &str) -> Option<String> {
    let cleaned = RE_TIME_JUNK.replace_all(raw, "");
    (!cleaned.is_empty()).then(|| cleaned.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::parse_response;
    use chrono::NaiveDate;

    fn candidate(title: &str) -> ExtractedEventCandidate {
        ExtractedEventCandidate {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn midterm_with_room_fallback() {
        let parsed = parse_response(
            "Sure! {\"events\":[{\"title\":\"Midterm\",\"date\":\"2024-03-15\",\"type\":\"test\"}], \"classLocation\":\"Room 101\"}",
        );
        let out = normalize(&parsed.events, &parsed.metadata);
        assert_eq!(out.events.len(), 1);
        let e = &out.events[0];
        assert_eq!(e.event_type, EventType::Test);
        assert_eq!(e.priority, Priority::High);
        assert_eq!(e.location.as_deref(), Some("Room 101"));
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn empty_parse_normalizes_to_nothing() {
        let parsed = parse_response("no valid output");
        let out = normalize(&parsed.events, &parsed.metadata);
        assert!(out.events.is_empty());
        assert_eq!(out.rejected, 0);
    }

    #[test]
    fn bad_date_and_unknown_type_are_repaired() {
        let c = ExtractedEventCandidate {
            title: Some("Lab".into()),
            date: Some("not-a-date".into()),
            event_type: Some("lab".into()),
            ..Default::default()
        };
        let e = normalize_candidate(&c, &DocumentMetadata::default()).unwrap();
        assert_eq!(e.title, "Lab");
        assert_eq!(e.date, None);
        assert_eq!(e.event_type, EventType::Assignment);
        assert_eq!(e.priority, Priority::Medium);
    }

    #[test]
    fn course_code_is_shared_across_document() {
        let parsed = parse_response(
            r#"{"events":[
                {"title":"HW1","date":"2024-01-20","type":"assignment","courseCode":"CS4400"},
                {"title":"HW2","date":"2024-01-27","type":"assignment"}
            ]}"#,
        );
        let out = normalize(&parsed.events, &parsed.metadata);
        assert_eq!(out.events.len(), 2);
        assert!(out
            .events
            .iter()
            .all(|e| e.course_code.as_deref() == Some("CS4400")));
        assert_eq!(out.metadata.course_code.as_deref(), Some("CS4400"));
    }

    #[test]
    fn document_level_course_fields_apply_to_all() {
        let doc = DocumentMetadata {
            class_location: None,
            course_title: Some("Databases".into()),
            course_code: Some("CS4400".into()),
        };
        let out = normalize(&[candidate("A"), candidate("B")], &doc);
        for e in &out.events {
            assert_eq!(e.course_title.as_deref(), Some("Databases"));
            assert_eq!(e.course_code.as_deref(), Some("CS4400"));
        }
    }

    #[test]
    fn own_location_beats_class_location() {
        let doc = DocumentMetadata {
            class_location: Some("Room 101".into()),
            ..Default::default()
        };
        let mut c = candidate("Office hours");
        c.location = Some("Office 3B".into());
        let e = normalize_candidate(&c, &doc).unwrap();
        assert_eq!(e.location.as_deref(), Some("Office 3B"));
    }

    #[test]
    fn every_shape_of_candidate_yields_valid_events() {
        let titles = [None, Some(""), Some("   "), Some("Quiz")];
        let dates = [None, Some("2024-05-01"), Some("garbage")];
        let types = [None, Some("test"), Some("seminar"), Some("OFFICE_HOURS")];
        let priorities = [None, Some("high"), Some("urgent")];

        let mut candidates = Vec::new();
        for t in titles {
            for d in dates {
                for ty in types {
                    for p in priorities {
                        candidates.push(ExtractedEventCandidate {
                            title: t.map(String::from),
                            date: d.map(String::from),
                            event_type: ty.map(String::from),
                            priority: p.map(String::from),
                            time: Some("at 3:00 p.m.!".into()),
                            ..Default::default()
                        });
                    }
                }
            }
        }

        let out = normalize(&candidates, &DocumentMetadata::default());
        // Only the "Quiz" quarter of the grid survives.
        assert_eq!(out.events.len(), candidates.len() / 4);
        assert_eq!(out.rejected, candidates.len() * 3 / 4);
        for e in &out.events {
            assert_eq!(e.title, "Quiz");
            assert!(EventType::ALL.contains(&e.event_type));
            assert!(!e.id.is_empty());
            assert_eq!(e.time.as_deref(), Some("a3:00pm"));
        }
    }

    #[test]
    fn priority_follows_type_when_absent_or_invalid() {
        for event_type in EventType::ALL {
            for priority in [None, Some("critical")] {
                let c = ExtractedEventCandidate {
                    title: Some("X".into()),
                    event_type: Some(event_type.as_str().into()),
                    priority: priority.map(String::from),
                    description: Some("anything at all".into()),
                    ..Default::default()
                };
                let e = normalize_candidate(&c, &DocumentMetadata::default()).unwrap();
                assert_eq!(e.priority, event_type.default_priority(), "{event_type}");
            }
        }
    }

    #[test]
    fn explicit_valid_priority_is_kept() {
        let mut c = candidate("Paper");
        c.event_type = Some("assignment".into());
        c.priority = Some("High".into());
        assert_eq!(
            normalize_candidate(&c, &DocumentMetadata::default()).unwrap().priority,
            Priority::High
        );
    }

    #[test]
    fn time_sanitization() {
        assert_eq!(sanitize_time("3:00 PM").as_deref(), Some("3:00PM"));
        assert_eq!(sanitize_time("10:30am (tentative)").as_deref(), Some("10:30ama"));
        assert_eq!(sanitize_time("--"), None);
    }

    #[test]
    fn order_is_preserved_and_ids_are_fresh() {
        let candidates: Vec<_> = ["First", "Second", "Third"].into_iter().map(candidate).collect();
        let a = normalize(&candidates, &DocumentMetadata::default());
        let b = normalize(&candidates, &DocumentMetadata::default());
        let titles: Vec<_> = a.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second", "Third"]);
        assert_ne!(a.events[0].id, b.events[0].id);
    }
}
