//! Per-document pipeline stages.
//!
//! Each submodule implements exactly one transformation step so each can be
//! tested on its own and the external boundaries stay narrow.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ parse ──▶ normalize
//! (path)   (base64)  (model)  (JSON)   (CalendarEvent)
//! ```
//!
//! 1. [`input`]     - make a durable local copy of files living in temporary
//!    or cache directories
//! 2. [`encode`]    - detect the MIME type, read (capped) and base64-wrap
//! 3. [`llm`]       - submit to the extraction service with a hard timeout and
//!    classify failures; [`gemini`] is the default backend
//! 4. [`parse`]     - pull one JSON object out of free text; never fails
//! 5. [`normalize`] - validate, repair and default each candidate event

pub mod encode;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod parse;
