//! Session aggregate and per-phase execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pattern::PhaseDefinition;

/// Lifecycle of a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "Pending"),
            SessionStatus::Running => write!(f, "Running"),
            SessionStatus::Completed => write!(f, "Completed"),
            SessionStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Lifecycle of one phase within a session.
///
/// Transitions are monotonic within a run: Pending → InProgress → Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhaseStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "Pending"),
            PhaseStatus::InProgress => write!(f, "InProgress"),
            PhaseStatus::Completed => write!(f, "Completed"),
            PhaseStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// User-supplied inputs for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub topic: String,
    /// Free-form outline; one point per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Story beats, distributed across phases in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<String>,
}

impl SessionConfig {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    pub fn with_outline(mut self, outline: &str) -> Self {
        self.outline = Some(outline.to_string());
        self
    }

    pub fn with_beats(mut self, beats: Vec<String>) -> Self {
        self.beats = beats;
        self
    }
}

/// Persisted execution state for one phase. Mutated in place, never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase_id: String,
    pub name: String,
    pub order: u32,
    pub status: PhaseStatus,
    /// Set only once the phase is Completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_path: Option<PathBuf>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseRecord {
    pub fn pending(definition: &PhaseDefinition) -> Self {
        Self {
            phase_id: definition.id.clone(),
            name: definition.name.clone(),
            order: definition.order,
            status: PhaseStatus::Pending,
            content_path: None,
            word_count: 0,
            duration_secs: 0,
            validated: false,
            warnings: Vec::new(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }

    pub fn mark_in_progress(&mut self) {
        self.status = PhaseStatus::InProgress;
    }

    pub fn mark_completed(
        &mut self,
        content_path: PathBuf,
        word_count: u32,
        duration_secs: u32,
        validated: bool,
        warnings: Vec<String>,
    ) {
        self.status = PhaseStatus::Completed;
        self.content_path = Some(content_path);
        self.word_count = word_count;
        self.duration_secs = duration_secs;
        self.validated = validated;
        self.warnings = warnings;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = PhaseStatus::Failed;
    }
}

/// The unit of resumable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pattern_id: String,
    pub config: SessionConfig,
    pub status: SessionStatus,
    pub output_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub total_word_count: u32,
    #[serde(default)]
    pub total_duration_secs: u32,
    /// One record per phase definition, in execution order
    pub phases: Vec<PhaseRecord>,
}

impl Session {
    /// Create a Pending session with one Pending record per definition.
    pub fn new(
        id: &str,
        pattern_id: &str,
        config: SessionConfig,
        output_dir: PathBuf,
        phases: &[PhaseDefinition],
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            pattern_id: pattern_id.to_string(),
            config,
            status: SessionStatus::Pending,
            output_dir,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            total_word_count: 0,
            total_duration_secs: 0,
            phases: phases.iter().map(PhaseRecord::pending).collect(),
        }
    }

    pub fn phase(&self, phase_id: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }

    pub fn phase_mut(&mut self, phase_id: &str) -> Option<&mut PhaseRecord> {
        self.phases.iter_mut().find(|p| p.phase_id == phase_id)
    }

    pub fn total_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn completed_count(&self) -> usize {
        self.phases.iter().filter(|p| p.is_completed()).count()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_running(&mut self) {
        self.status = SessionStatus::Running;
        self.error_message = None;
        self.touch();
    }

    pub fn mark_completed(&mut self) {
        self.recompute_totals();
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn mark_failed(&mut self, message: String) {
        self.status = SessionStatus::Failed;
        self.error_message = Some(message);
        self.touch();
    }

    /// Sum word count and duration over Completed phases, validated or not.
    pub fn recompute_totals(&mut self) {
        let completed = self.phases.iter().filter(|p| p.is_completed());
        let (words, secs) = completed.fold((0u32, 0u32), |(w, s), p| {
            (w + p.word_count, s + p.duration_secs)
        });
        self.total_word_count = words;
        self.total_duration_secs = secs;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            pattern_id: self.pattern_id.clone(),
            topic: self.config.topic.clone(),
            status: self.status,
            completed_phases: self.completed_count(),
            total_phases: self.total_phases(),
            created_at: self.created_at,
        }
    }
}

/// Compact listing view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub pattern_id: String,
    pub topic: String,
    pub status: SessionStatus,
    pub completed_phases: usize,
    pub total_phases: usize,
    pub created_at: DateTime<Utc>,
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Range;

    fn defs() -> Vec<PhaseDefinition> {
        vec![
            PhaseDefinition::new("hook", "Hook", 1, Range::new(10, 20)),
            PhaseDefinition::new("closing", "Closing", 2, Range::new(10, 20)),
        ]
    }

    #[test]
    fn test_new_session_has_one_pending_record_per_phase() {
        let session = Session::new(
            "s1",
            "p",
            SessionConfig::new("rust"),
            PathBuf::from("/tmp/s1"),
            &defs(),
        );
        assert_eq!(session.phases.len(), 2);
        assert!(session.phases.iter().all(|p| p.status == PhaseStatus::Pending));
        assert_eq!(session.phases[0].phase_id, "hook");
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_recompute_totals_counts_only_completed() {
        let mut session = Session::new("s1", "p", SessionConfig::new("t"), PathBuf::new(), &defs());
        session.phases[0].mark_completed(PathBuf::from("a"), 15, 6, false, vec!["w".into()]);
        session.phases[1].word_count = 99;
        session.recompute_totals();
        assert_eq!(session.total_word_count, 15);
        assert_eq!(session.total_duration_secs, 6);
    }

    #[test]
    fn test_mark_failed_records_message() {
        let mut session = Session::new("s1", "p", SessionConfig::new("t"), PathBuf::new(), &defs());
        session.mark_failed("Phase 'Hook' failed: boom".into());
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.error_message.as_deref().unwrap().contains("Hook"));
    }

    #[test]
    fn test_session_json_roundtrip_keeps_records() {
        let mut session = Session::new("s1", "p", SessionConfig::new("t"), PathBuf::new(), &defs());
        session.phases[0].mark_completed(PathBuf::from("01-hook.txt"), 12, 5, true, vec![]);
        let json = serde_json::to_string_pretty(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }

    #[test]
    fn test_status_display_strings() {
        assert_eq!(PhaseStatus::InProgress.to_string(), "InProgress");
        assert_eq!(SessionStatus::Completed.to_string(), "Completed");
    }
}
