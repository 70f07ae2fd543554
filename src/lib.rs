//! # syllabus-cal
//!
//! Turn course documents (syllabi, schedules, assignment sheets) into
//! calendar events using a generative model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input      durable copy of files picked from temp/cache dirs
//!  ├─ 2. Encode     MIME detection, 1 MiB read cap, base64
//!  ├─ 3. Prompt     fixed JSON contract for the model
//!  ├─ 4. Extract    one bounded call to Gemini (or any edgequake-llm provider)
//!  ├─ 5. Parse      tolerant brace-slicing of the model's free text
//!  ├─ 6. Normalize  title check, day-exact dates, type/priority defaults
//!  ├─ 7. Review     select, edit, confirm (recurrence gate)
//!  └─ 8. Persist    parallel saves with retry, ICS export
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use syllabus_cal::{extract_batch, review, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let output = extract_batch(&["syllabus.pdf", "schedule.png"], &config).await?;
//!     for failed in output.failures() {
//!         eprintln!("{}: {}", failed.path.display(), failed.error.as_ref().unwrap());
//!     }
//!
//!     let confirmed = review::confirm(review::pending(output.events))?;
//!     println!("{}", syllabus_cal::export_ics(&confirmed));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `syllabus2cal` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! syllabus-cal = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dates;
pub mod error;
pub mod event;
pub mod export;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;
pub mod store;
pub mod sync;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{
    CandidateRejected, ExtractionError, FileAccessError, FileError, PersistenceError, ReviewError, SyllabusError,
};
pub use event::{CalendarEvent, DayOfWeek, DocumentMetadata, EventEdit, EventType, Frequency, Priority, Recurrence};
pub use export::{export_ics, write_ics};
pub use extract::{extract, extract_batch, extract_bytes};
pub use output::{BatchOutput, BatchStats, FileResult};
pub use pipeline::llm::{ExtractionService, ServiceFailure};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use review::{confirm, PendingEvent};
pub use store::{CalendarEventStore, InMemoryEventStore, JsonFileStore, StoredEvent};
pub use sync::{sync_events, RetryPolicy, SyncReport, SyncState};
