//! Default validation rules.
//!
//! Each rule is independent: it declares which phases it applies to and
//! returns zero or more issues for a piece of content.

use scribe_common::PhaseDefinition;

use super::{Severity, ValidationIssue, count_words};
use crate::orchestrator::GenerationContext;

/// A single named check against generated content.
pub trait ValidationRule: Send + Sync {
    /// Category reported on every issue this rule produces.
    fn category(&self) -> &'static str;

    /// Static applicability predicate; must not look at content.
    fn applies_to(&self, phase: &PhaseDefinition) -> bool;

    fn validate(
        &self,
        content: &str,
        phase: &PhaseDefinition,
        context: &GenerationContext,
    ) -> Vec<ValidationIssue>;
}

/// Rejects content outside the phase's word-count range (inclusive).
pub struct WordCountRule;

impl ValidationRule for WordCountRule {
    fn category(&self) -> &'static str {
        "WordCount"
    }

    fn applies_to(&self, _phase: &PhaseDefinition) -> bool {
        true
    }

    fn validate(
        &self,
        content: &str,
        phase: &PhaseDefinition,
        _context: &GenerationContext,
    ) -> Vec<ValidationIssue> {
        let words = count_words(content);
        let target = phase.word_count;
        if words < target.min {
            vec![ValidationIssue::error(
                self.category(),
                format!(
                    "Content has {} words, below the minimum of {} (target {}). Expand it by at least {} words.",
                    words,
                    target.min,
                    target,
                    target.min - words
                ),
            )]
        } else if words > target.max {
            vec![ValidationIssue::error(
                self.category(),
                format!(
                    "Content has {} words, above the maximum of {} (target {}). Cut at least {} words.",
                    words,
                    target.max,
                    target,
                    words - target.max
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Rejects every forbidden substring found, ignoring case.
pub struct ForbiddenPatternRule;

impl ValidationRule for ForbiddenPatternRule {
    fn category(&self) -> &'static str {
        "ForbiddenPatterns"
    }

    fn applies_to(&self, phase: &PhaseDefinition) -> bool {
        !phase.forbidden_patterns.is_empty()
    }

    fn validate(
        &self,
        content: &str,
        phase: &PhaseDefinition,
        _context: &GenerationContext,
    ) -> Vec<ValidationIssue> {
        let haystack = content.to_lowercase();
        phase
            .forbidden_patterns
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .filter(|pattern| haystack.contains(&pattern.to_lowercase()))
            .map(|pattern| {
                ValidationIssue::error(
                    self.category(),
                    format!("Content contains forbidden phrase \"{}\". Remove it.", pattern),
                )
            })
            .collect()
    }
}

/// Warns about required elements whose keyword form is missing.
pub struct RequiredElementsRule;

impl RequiredElementsRule {
    /// `call_to_action` → `call to action`
    pub fn keyword(element: &str) -> String {
        element.replace('_', " ").to_lowercase()
    }
}

impl ValidationRule for RequiredElementsRule {
    fn category(&self) -> &'static str {
        "RequiredElements"
    }

    fn applies_to(&self, phase: &PhaseDefinition) -> bool {
        !phase.required_elements.is_empty()
    }

    fn validate(
        &self,
        content: &str,
        phase: &PhaseDefinition,
        _context: &GenerationContext,
    ) -> Vec<ValidationIssue> {
        let haystack = content.to_lowercase();
        phase
            .required_elements
            .iter()
            .filter(|element| !haystack.contains(&Self::keyword(element)))
            .map(|element| ValidationIssue {
                category: self.category().to_string(),
                message: format!(
                    "Required element \"{}\" does not appear in the content.",
                    Self::keyword(element)
                ),
                severity: Severity::Warning,
            })
            .collect()
    }
}

pub fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    vec![
        Box::new(WordCountRule),
        Box::new(ForbiddenPatternRule),
        Box::new(RequiredElementsRule),
    ]
}
