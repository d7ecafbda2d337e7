//! Shared domain types for scribe.
//!
//! | Module    | What it owns                                                  |
//! |-----------|---------------------------------------------------------------|
//! | `pattern` | `Pattern`, `PhaseDefinition`, `Range`, pattern validation     |
//! | `session` | `Session`, `PhaseRecord`, `SessionConfig`, status enums       |
//! | `events`  | `ProgressEvent`, `PhaseProgress`, `SessionProgress`           |
//!
//! Nothing in this crate performs I/O. Persistence, generation and event
//! delivery live in the `scribe` crate.

pub mod events;
pub mod pattern;
pub mod session;

pub use events::{PhaseProgress, ProgressEvent, SessionProgress, progress_percent};
pub use pattern::{Pattern, PatternError, PhaseDefinition, Range};
pub use session::{
    PhaseRecord, PhaseStatus, Session, SessionConfig, SessionStatus, SessionSummary,
    new_session_id,
};
