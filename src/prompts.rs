//! Instruction text for the extraction service.
//!
//! All prompt wording lives here so the contract the model must honour can be
//! reviewed and tested in one place. Callers can override it via
//! [`crate::config::ExtractionConfig::system_prompt`]; the builder here is used
//! only when no override is provided.
//!
//! The prompt is the *request* side of the contract. The *tolerance* side is
//! [`crate::pipeline::parse`] and [`crate::pipeline::normalize`], which accept
//! whatever comes back even when the model ignores these rules.

/// Output schema shown to the model verbatim.
pub const RESPONSE_SCHEMA: &str = r#"{
  "events": [
    {
      "title": "string (required)",
      "date": "YYYY-MM-DD (required)",
      "type": "test | assignment | meeting | office_hours (required)",
      "priority": "low | medium | high (optional)",
      "time": "string such as 3:00 PM (optional)",
      "location": "string (optional)",
      "description": "string (optional)"
    }
  ],
  "classLocation": "string or null",
  "courseTitle": "string or null",
  "courseCode": "string or null"
}"#;

/// Response to produce when the document contains nothing schedulable.
pub const EMPTY_RESPONSE: &str = r#"{"events": [], "classLocation": null}"#;

/// Build the instruction text for a document of the given MIME type.
///
/// Pure: no I/O, same input → same output.
pub fn build_prompt(mime_type: &str) -> String {
    format!(
        r#"You are reading a course document ({kind}) such as a syllabus or course schedule. Extract every dated academic event from it.

Respond with EXACTLY ONE JSON object and nothing else, using this schema:

{schema}

RULES
1. "events" is always an array. If no events are found, respond with {empty}. Never return null and never omit "events".
2. "title", "date" and "type" are required for every event.
3. "date" must be a single calendar day in YYYY-MM-DD format. Resolve relative dates ("Week 3 Monday") against the term dates stated in the document.
4. "type" must be one of: test, assignment, meeting, office_hours.
   - exams, quizzes, midterms and finals are "test"
   - homework, projects, papers, labs and readings are "assignment"
   - lectures, classes, lab sessions and review sessions are "meeting"
   - instructor or TA availability is "office_hours"
5. Infer "priority" when it is not stated: tests are high, assignments and meetings are medium, office hours are low.
6. Infer "time" from the document when it is not stated next to the event (for example from the class meeting time). Leave it out if it cannot be inferred.
7. Put the usual class room or building in the top-level "classLocation", the course name in "courseTitle" and the course code (e.g. CS 4400) in "courseCode". Use null when unknown.
8. Do not invent events that are not in the document. Do not wrap the JSON in markdown fences. Do not add commentary."#,
        kind = describe_mime(mime_type),
        schema = RESPONSE_SCHEMA,
        empty = EMPTY_RESPONSE,
    )
}

fn describe_mime(mime_type: &str) -> &'static str {
    if mime_type == "application/pdf" {
        "a PDF"
    } else if mime_type.starts_with("image/") {
        "a photo or screenshot"
    } else {
        "an uploaded file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_deterministic() {
        assert_eq!(build_prompt("application/pdf"), build_prompt("application/pdf"));
    }

    #[test]
    fn prompt_lists_every_event_type() {
        let p = build_prompt("application/pdf");
        for t in crate::event::EventType::ALL {
            assert!(p.contains(t.as_str()), "missing type {t}");
        }
    }

    #[test]
    fn prompt_requires_empty_array_for_no_events() {
        let p = build_prompt("image/png");
        assert!(p.contains(EMPTY_RESPONSE));
        assert!(p.contains("Never return null"));
    }

    #[test]
    fn prompt_asks_to_infer_priority_and_time() {
        let p = build_prompt("application/pdf");
        assert!(p.contains("Infer \"priority\""));
        assert!(p.contains("Infer \"time\""));
        assert!(p.contains("YYYY-MM-DD"));
    }

    #[test]
    fn prompt_mentions_document_kind() {
        assert!(build_prompt("application/pdf").contains("a PDF"));
        assert!(build_prompt("image/jpeg").contains("photo"));
    }

    #[test]
    fn empty_response_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(EMPTY_RESPONSE).unwrap();
        assert!(v["events"].as_array().unwrap().is_empty());
    }
}
