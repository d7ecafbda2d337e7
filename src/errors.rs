//! Typed error hierarchy for the scribe orchestrator.
//!
//! Two enums cover the orchestration core:
//! - `OrchestratorError` — session lifecycle and generation-trigger failures
//! - `PhaseError` — fatal failures of a single phase execution
//!
//! Validation failures are not errors; they surface as issues on a phase
//! result. Client failures are `generation::GenerationError`.

use std::path::PathBuf;
use thiserror::Error;

use crate::generation::GenerationError;

/// Errors from session lifecycle and generation-trigger operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Pattern '{id}' not found")]
    PatternNotFound { id: String },

    #[error("Session '{id}' not found")]
    SessionNotFound { id: String },

    #[error("Session '{id}' already exists")]
    SessionExists { id: String },

    #[error("Phase '{phase_id}' not found in session '{session_id}'")]
    PhaseNotFound { session_id: String, phase_id: String },

    #[error("Phase '{phase}' failed: {source}")]
    PhaseFailed {
        phase: String,
        #[source]
        source: PhaseError,
    },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Failed to write phase content at {path}: {source}")]
    ContentWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Unknown pattern, session or phase: the caller asked for something that
    /// doesn't exist, and nothing was mutated.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrchestratorError::PatternNotFound { .. }
                | OrchestratorError::SessionNotFound { .. }
                | OrchestratorError::PhaseNotFound { .. }
        )
    }
}

/// Errors from a single phase execution.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Generation service unavailable after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Phase execution cancelled")]
    Cancelled,
}
