//! Error types for the syllabus-cal library.
//!
//! Failures are layered the same way the pipeline is:
//!
//! * [`SyllabusError`]: **Fatal** for the whole call. The batch cannot start
//!   (no provider configured, invalid config) or a single-file entry point
//!   failed outright.
//!
//! * [`FileError`]: **Non-fatal**. One uploaded document could not be read or
//!   the extraction service rejected it. Stored on
//!   [`crate::output::FileResult`] so the other files in the batch still
//!   contribute their events.
//!
//! * [`CandidateRejected`]: a single candidate event was unrecoverable. The
//!   normalizer logs and drops it; it never leaves the pipeline.
//!
//! * [`ReviewError`]: user-facing validation raised at confirmation time.
//!
//! * [`PersistenceError`]: store failures, retried by [`crate::sync`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the syllabus-cal library.
#[derive(Debug, Error)]
pub enum SyllabusError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The extraction backend cannot be constructed (missing API key etc.).
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// A single-file entry point failed; batch entry points report this
    /// per file instead.
    #[error(transparent)]
    FileFailed(#[from] FileError),

    /// The store rejected an operation after all retries.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (e.g. an `.ics` export).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The source document could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FileAccessError {
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Zero-length files are a hard failure, never an empty extraction.
    #[error("File is empty: '{path}'")]
    Empty { path: PathBuf },

    /// The file lived in a temporary/cache directory and disappeared before a
    /// durable copy could be made.
    #[error("File '{path}' vanished before it could be copied; select it again")]
    Vanished { path: PathBuf },

    #[error("Failed to read '{path}': {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// Only images and PDFs are accepted.
    #[error("Unsupported file type for '{path}': expected an image or PDF")]
    UnsupportedType { path: PathBuf },
}

/// Closed taxonomy of extraction-service failures.
///
/// Classification happens once in [`crate::pipeline::llm`]; callers pick a
/// message with [`ExtractionError::user_message`] instead of matching on
/// provider error strings.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionError {
    #[error("Extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Extraction quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    #[error("Extraction service rejected the file format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("Extraction failed: {detail}")]
    Unknown { detail: String },
}

impl ExtractionError {
    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExtractionError::Timeout { .. } => {
                "The document took too long to process. Try a smaller file or fewer pages."
            }
            ExtractionError::QuotaExceeded { .. } => {
                "The extraction service is busy or out of quota. Please try again later."
            }
            ExtractionError::UnsupportedFormat { .. } => {
                "This file format is not supported. Upload a PDF or an image."
            }
            ExtractionError::Unknown { .. } => {
                "Something went wrong while reading the document. Please try again."
            }
        }
    }
}

/// A non-fatal error for a single uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FileError {
    #[error(transparent)]
    Access(#[from] FileAccessError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl FileError {
    pub fn user_message(&self) -> String {
        match self {
            FileError::Access(e) => e.to_string(),
            FileError::Extraction(e) => e.user_message().to_string(),
        }
    }
}

/// Why a candidate event was dropped by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CandidateRejected {
    #[error("candidate has no title")]
    MissingTitle,
}

/// Validation failure that blocks confirming a reviewed batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// The title was edited down to nothing.
    #[error("An event has an empty title")]
    MissingTitle,

    /// Open-ended recurring series are not allowed.
    #[error("Recurring event '{title}' needs an end date")]
    RecurrenceEndDateMissing { title: String },

    #[error("Recurring event '{title}' ends before it starts")]
    RecurrenceEndsBeforeStart { title: String },

    /// The model produced no usable date and the user has not supplied one.
    #[error("Event '{title}' has no date")]
    MissingDate { title: String },
}

/// Errors from a [`crate::store::CalendarEventStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Store I/O failed: {0}")]
    Io(String),

    #[error("Store data could not be (de)serialised: {0}")]
    Serialization(String),

    #[error("Invalid user id '{0}'")]
    InvalidUserId(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Serialization(e.to_string())
    }
}
