//! Pattern catalog entries.
//!
//! A [`Pattern`] is an immutable description of how a piece of content is
//! built: an ordered list of [`PhaseDefinition`]s plus global tone/style
//! rules that are passed through to prompt rendering untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Inclusive numeric range used for word-count and duration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Range {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Both bounds are inclusive.
    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// One phase of a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseDefinition {
    /// Identifier, unique within its pattern (e.g. "hook", "contextualization")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Execution order; ties keep declaration order
    pub order: u32,
    /// Target word count, inclusive
    pub word_count: Range,
    /// Target spoken duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<Range>,
    /// Elements the content should contain (underscores read as spaces)
    #[serde(default)]
    pub required_elements: Vec<String>,
    /// Substrings the content must never contain (case-insensitive)
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    /// Free-form guidance for the prompt renderer
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub is_first_phase: bool,
    /// Derived from the active ordering, never read from or written to a pattern file.
    #[serde(skip)]
    pub is_final_phase: bool,
}

impl PhaseDefinition {
    pub fn new(id: &str, name: &str, order: u32, word_count: Range) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            order,
            word_count,
            duration_secs: None,
            required_elements: Vec::new(),
            forbidden_patterns: Vec::new(),
            instructions: String::new(),
            is_first_phase: false,
            is_final_phase: false,
        }
    }

    pub fn with_required_elements(mut self, elements: Vec<String>) -> Self {
        self.required_elements = elements;
        self
    }

    pub fn with_forbidden_patterns(mut self, patterns: Vec<String>) -> Self {
        self.forbidden_patterns = patterns;
        self
    }

    pub fn with_duration(mut self, duration_secs: Range) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = instructions.to_string();
        self
    }

    pub fn first(mut self) -> Self {
        self.is_first_phase = true;
        self
    }

    /// File stem used for this phase's content, e.g. `02-contextualization`.
    pub fn file_stem(&self) -> String {
        format!("{:02}-{}", self.order, self.id)
    }
}

/// Problems detected when loading a pattern.
#[derive(Debug, Error, PartialEq)]
pub enum PatternError {
    #[error("Pattern '{pattern}' has no phases")]
    NoPhases { pattern: String },

    #[error("Pattern '{pattern}' declares phase '{phase}' more than once")]
    DuplicatePhase { pattern: String, phase: String },

    #[error("Pattern '{pattern}' phase '{phase}' has an invalid {field} range {range}")]
    InvalidRange {
        pattern: String,
        phase: String,
        field: &'static str,
        range: Range,
    },
}

/// An immutable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    /// Catalog identifier. Directory-backed catalogs fill this from the file stem when absent.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tone and style constraints, opaque to the orchestrator
    #[serde(default)]
    pub global_rules: Vec<String>,
    pub phases: Vec<PhaseDefinition>,
}

impl Pattern {
    pub fn new(id: &str, name: &str, phases: Vec<PhaseDefinition>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            global_rules: Vec::new(),
            phases,
        }
    }

    pub fn with_global_rules(mut self, rules: Vec<String>) -> Self {
        self.global_rules = rules;
        self
    }

    /// Phases in execution order with the final-phase flag derived.
    ///
    /// The sort is stable, so phases sharing an order keep their declaration
    /// order. Exactly one phase (the last one) is flagged final.
    pub fn ordered_phases(&self) -> Vec<PhaseDefinition> {
        let mut phases = self.phases.clone();
        phases.sort_by_key(|p| p.order);
        let last = phases.len().saturating_sub(1);
        for (i, phase) in phases.iter_mut().enumerate() {
            phase.is_final_phase = i == last;
        }
        phases
    }

    pub fn phase(&self, id: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn validate(&self) -> Result<(), PatternError> {
        if self.phases.is_empty() {
            return Err(PatternError::NoPhases {
                pattern: self.id.clone(),
            });
        }

        let mut seen = HashSet::new();
        for phase in &self.phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(PatternError::DuplicatePhase {
                    pattern: self.id.clone(),
                    phase: phase.id.clone(),
                });
            }
            if !phase.word_count.is_valid() {
                return Err(PatternError::InvalidRange {
                    pattern: self.id.clone(),
                    phase: phase.id.clone(),
                    field: "word_count",
                    range: phase.word_count,
                });
            }
            if let Some(duration) = phase.duration_secs
                && !duration.is_valid()
            {
                return Err(PatternError::InvalidRange {
                    pattern: self.id.clone(),
                    phase: phase.id.clone(),
                    field: "duration_secs",
                    range: duration,
                });
            }
        }
        Ok(())
    }
}
