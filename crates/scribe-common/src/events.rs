//! Progress events published while a session runs.

use serde::{Deserialize, Serialize};

use crate::session::{PhaseStatus, SessionStatus};

/// Phase-level progress: one event when a phase starts, one when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub session_id: String,
    pub phase_id: String,
    pub phase_name: String,
    pub phase_order: u32,
    pub total_phases: usize,
    pub status: PhaseStatus,
    pub message: String,
}

/// Session-level progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub session_id: String,
    pub status: SessionStatus,
    pub completed_phases: usize,
    pub total_phases: usize,
    pub percent: u8,
    pub message: String,
}

impl SessionProgress {
    pub fn new(
        session_id: &str,
        status: SessionStatus,
        completed_phases: usize,
        total_phases: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            status,
            completed_phases,
            total_phases,
            percent: progress_percent(completed_phases, total_phases),
            message: message.into(),
        }
    }
}

/// Integer percentage, 0 when there is nothing to do.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed.min(total) * 100) / total) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Phase(PhaseProgress),
    Session(SessionProgress),
}

impl ProgressEvent {
    pub fn session_id(&self) -> &str {
        match self {
            ProgressEvent::Phase(p) => &p.session_id,
            ProgressEvent::Session(s) => &s.session_id,
        }
    }
}
