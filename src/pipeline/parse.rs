//! Response parsing: free text from the model → candidate events.
//!
//! Models routinely wrap the requested JSON in prose ("Sure! Here are the
//! events: {...}") or markdown fences. The parser slices from the first `{`
//! to the last `}` and decodes that. Anything that does not produce an
//! object with an array-typed `events` field degrades to an empty result.
//! [`parse_response`] never fails and never panics.
//!
//! This brace-slicing tolerance is for model output only. Persisted records
//! go through [`crate::store`] with strict serde decoding.

use crate::event::DocumentMetadata;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One loosely-typed event as the model produced it. Any field may be
/// missing; values of the wrong JSON type are treated as missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedEventCandidate {
    pub title: Option<String>,
    pub date: Option<String>,
    pub event_type: Option<String>,
    pub priority: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub course_code: Option<String>,
    pub course_title: Option<String>,
}

impl ExtractedEventCandidate {
    /// Read a candidate out of one element of the `events` array.
    /// Non-object elements yield an empty candidate.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            title: text_field(obj, "title"),
            date: text_field(obj, "date"),
            event_type: text_field(obj, "type"),
            priority: text_field(obj, "priority"),
            time: text_field(obj, "time"),
            location: text_field(obj, "location"),
            description: text_field(obj, "description"),
            course_code: text_field(obj, "courseCode"),
            course_title: text_field(obj, "courseTitle"),
        }
    }
}

/// Result of parsing one model response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    pub events: Vec<ExtractedEventCandidate>,
    pub metadata: DocumentMetadata,
}

/// Parse a raw model response. Total: every input yields a value.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some(slice) = extract_json_object(raw) else {
        if !raw.trim().is_empty() {
            warn!("Model response contains no JSON object ({} chars)", raw.len());
        }
        return ParsedResponse::default();
    };

    let root: Value = match serde_json::from_str(slice) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model response JSON did not parse: {e}");
            return ParsedResponse::default();
        }
    };

    let Some(obj) = root.as_object() else {
        return ParsedResponse::default();
    };

    let Some(events) = obj.get("events").and_then(Value::as_array) else {
        warn!("Model response has no `events` array");
        return ParsedResponse::default();
    };

    let parsed = ParsedResponse {
        events: events.iter().map(ExtractedEventCandidate::from_value).collect(),
        metadata: DocumentMetadata {
            class_location: text_field(obj, "classLocation"),
            course_title: text_field(obj, "courseTitle"),
            course_code: text_field(obj, "courseCode"),
        },
    };
    debug!("Parsed {} candidate events", parsed.events.len());
    parsed
}

/// Slice from the first `{` to the last `}` inclusive.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// A trimmed, non-empty string field; other JSON types count as absent.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
