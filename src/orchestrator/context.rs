//! Run-scoped generation context.
//!
//! A [`GenerationContext`] is built fresh for every orchestration call
//! (initial run, resume, single-phase regeneration) and dropped at the end of
//! it. It is never persisted: everything in it can be rebuilt from the
//! session record, the pattern and the phase content files.

use scribe_common::{Pattern, PhaseDefinition, SessionConfig};
use std::collections::HashMap;
use std::path::PathBuf;

use super::outline::{distribute, split_points};

const OPENING_MAX_CHARS: usize = 160;

/// Summary of a phase that already produced content in this run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPhase {
    pub phase_id: String,
    pub name: String,
    pub order: u32,
    pub content: String,
    pub word_count: u32,
    pub duration_secs: u32,
}

#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub session_id: String,
    pub config: SessionConfig,
    pub pattern: Pattern,
    /// Phases in execution order, final flag derived once here
    pub phases: Vec<PhaseDefinition>,
    pub output_dir: PathBuf,
    /// Completed phases, kept in execution order
    pub completed: Vec<CompletedPhase>,
    /// Outline points keyed by phase id
    pub outline_distribution: HashMap<String, Vec<String>>,
    /// Story beats keyed by phase id
    pub beat_distribution: HashMap<String, Vec<String>>,
    /// Outline points for the phase currently executing
    pub current_outline_points: Option<Vec<String>>,
    /// Story beats for the phase currently executing
    pub current_beats: Option<Vec<String>>,
}

impl GenerationContext {
    pub fn new(
        session_id: &str,
        config: SessionConfig,
        pattern: &Pattern,
        output_dir: PathBuf,
    ) -> Self {
        let phases = pattern.ordered_phases();
        let phase_ids: Vec<String> = phases.iter().map(|p| p.id.clone()).collect();

        let outline_points = config
            .outline
            .as_deref()
            .map(split_points)
            .unwrap_or_default();
        let outline_distribution = distribute(&outline_points, &phase_ids);
        let beat_distribution = distribute(&config.beats, &phase_ids);

        Self {
            session_id: session_id.to_string(),
            config,
            pattern: pattern.clone(),
            phases,
            output_dir,
            completed: Vec::new(),
            outline_distribution,
            beat_distribution,
            current_outline_points: None,
            current_beats: None,
        }
    }

    pub fn phase(&self, phase_id: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == phase_id)
    }

    pub fn final_phase(&self) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.is_final_phase)
    }

    pub fn is_completed(&self, phase_id: &str) -> bool {
        self.completed.iter().any(|c| c.phase_id == phase_id)
    }

    /// Zero-based position of `phase_id` in execution order.
    pub fn position(&self, phase_id: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.id == phase_id)
    }

    pub fn push_completed(&mut self, phase: CompletedPhase) {
        self.completed.retain(|c| c.phase_id != phase.phase_id);
        self.completed.push(phase);
        let phases = &self.phases;
        self.completed.sort_by_key(|c| {
            let position = phases.iter().position(|p| p.id == c.phase_id);
            (position.unwrap_or(usize::MAX), c.order)
        });
    }

    /// The nearest completed phase that runs before `phase`.
    ///
    /// Walks execution order rather than raw order values, so phases sharing
    /// an order still see the tie-mate declared before them.
    pub fn previous_phase(&self, phase: &PhaseDefinition) -> Option<&CompletedPhase> {
        let position = self.position(&phase.id)?;
        self.phases[..position]
            .iter()
            .rev()
            .find_map(|p| self.completed.iter().find(|c| c.phase_id == p.id))
    }

    /// Populate the current-phase slots from the distribution maps.
    pub fn enter_phase(&mut self, phase_id: &str) {
        self.current_outline_points = self.outline_distribution.get(phase_id).cloned();
        self.current_beats = self.beat_distribution.get(phase_id).cloned();
    }

    pub fn leave_phase(&mut self) {
        self.current_outline_points = None;
        self.current_beats = None;
    }

    /// Outline points for `phase_id`: the current slot if set, else the map.
    pub fn outline_points_for(&self, phase_id: &str) -> Vec<String> {
        self.current_outline_points
            .clone()
            .or_else(|| self.outline_distribution.get(phase_id).cloned())
            .unwrap_or_default()
    }

    pub fn beats_for(&self, phase_id: &str) -> Vec<String> {
        self.current_beats
            .clone()
            .or_else(|| self.beat_distribution.get(phase_id).cloned())
            .unwrap_or_default()
    }

    /// Opening sentences of every completed phase, so later phases don't reuse them.
    pub fn anti_repetition(&self) -> Vec<String> {
        self.completed
            .iter()
            .filter_map(|c| opening_sentence(&c.content))
            .collect()
    }

    pub fn total_word_count(&self) -> u32 {
        self.completed.iter().map(|c| c.word_count).sum()
    }

    pub fn total_duration_secs(&self) -> u32 {
        self.completed.iter().map(|c| c.duration_secs).sum()
    }
}

/// Everything the prompt renderer needs beyond the phase and the run context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseLocalContext {
    pub previous_phase_name: Option<String>,
    pub previous_content: Option<String>,
    pub outline_points: Vec<String>,
    pub beats: Vec<String>,
    pub anti_repetition: Vec<String>,
    /// 0 on the first attempt
    pub attempt: u32,
    /// Validator feedback from the previous attempt, empty on attempt 0
    pub feedback: String,
}

impl PhaseLocalContext {
    pub fn assemble(
        phase: &PhaseDefinition,
        context: &GenerationContext,
        attempt: u32,
        feedback: &str,
    ) -> Self {
        let previous = context.previous_phase(phase);
        Self {
            previous_phase_name: previous.map(|p| p.name.clone()),
            previous_content: previous.map(|p| p.content.clone()),
            outline_points: context.outline_points_for(&phase.id),
            beats: context.beats_for(&phase.id),
            anti_repetition: context.anti_repetition(),
            attempt,
            feedback: feedback.to_string(),
        }
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0 && !self.feedback.is_empty()
    }
}

fn opening_sentence(content: &str) -> Option<String> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !crate::validation::is_marker_line(l))?;
    let end = line
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(line.len());
    let sentence: String = line[..end].chars().take(OPENING_MAX_CHARS).collect();
    Some(sentence)
}
