//! Output types returned by the extraction entry points.

use crate::error::FileError;
use crate::event::{CalendarEvent, DocumentMetadata};
use serde::Serialize;
use std::path::PathBuf;

/// Result for a single uploaded document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// 1-based position in the batch.
    pub index: usize,
    pub path: PathBuf,
    pub events: Vec<CalendarEvent>,
    pub document: DocumentMetadata,
    /// Candidates the normalizer dropped.
    pub rejected_candidates: usize,
    /// Only a prefix of the file was sent.
    pub truncated: bool,
    pub duration_ms: u64,
    /// Set when this document failed; `events` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
}

impl FileResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_files: usize,
    pub succeeded_files: usize,
    pub failed_files: usize,
    pub total_events: usize,
    pub rejected_candidates: usize,
    pub duration_ms: u64,
}

/// Result of [`crate::extract::extract_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// All extracted events, concatenated in submission order.
    pub events: Vec<CalendarEvent>,
    /// One entry per input file, in submission order.
    pub files: Vec<FileResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|f| !f.is_ok())
    }
}
