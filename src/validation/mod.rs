//! Rule-based content validation.
//!
//! [`ContentValidator`] runs every applicable [`ValidationRule`] against a
//! phase's formatted content and folds the issues into a verdict. A result is
//! valid iff no issue has [`Severity::Error`]. The validator also renders
//! unresolved issues into feedback text for the next regeneration attempt.

pub mod rules;

use scribe_common::PhaseDefinition;
use std::fmt::Write as _;

use crate::orchestrator::GenerationContext;
pub use rules::{
    ForbiddenPatternRule, RequiredElementsRule, ValidationRule, WordCountRule, default_rules,
};

/// Spoken words per second (≈140 words per minute), as hundredths.
const WORDS_PER_SECOND_X100: u64 = 233;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub category: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(category: &str, message: String) -> Self {
        Self {
            category: category.to_string(),
            message,
            severity: Severity::Error,
        }
    }

    /// `[Category] message`, the form stored in phase record warnings.
    pub fn describe(&self) -> String {
        format!("[{}] {}", self.category, self.message)
    }
}

/// Outcome of validating one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub word_count: u32,
    pub duration_secs: u32,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Every issue in `[Category] message` form.
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ValidationIssue::describe).collect()
    }
}

pub struct ContentValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentValidator {
    /// Validator with the default rule set.
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn add_rule(mut self, rule: Box<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn validate(
        &self,
        content: &str,
        phase: &PhaseDefinition,
        context: &GenerationContext,
    ) -> ValidationResult {
        let issues: Vec<ValidationIssue> = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(phase))
            .flat_map(|rule| rule.validate(content, phase, context))
            .collect();

        let word_count = count_words(content);
        ValidationResult {
            is_valid: !issues.iter().any(|i| i.severity == Severity::Error),
            word_count,
            duration_secs: estimate_duration_secs(word_count),
            issues,
        }
    }

    /// Feedback for the next attempt; empty when the result is already valid.
    pub fn regeneration_feedback(&self, result: &ValidationResult) -> String {
        if result.is_valid || result.issues.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        let errors: Vec<_> = result.errors().collect();
        if !errors.is_empty() {
            out.push_str("MUST FIX:\n");
            for issue in errors {
                let _ = writeln!(out, "- [{}] {}", issue.category, issue.message);
            }
        }
        let warnings: Vec<_> = result.warnings().collect();
        if !warnings.is_empty() {
            out.push_str("SHOULD FIX:\n");
            for issue in warnings {
                let _ = writeln!(out, "- [{}] {}", issue.category, issue.message);
            }
        }
        let _ = write!(out, "Current word count: {}", result.word_count);
        out
    }
}

/// Lines that carry structure rather than spoken text.
pub fn is_marker_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('#')
        || line.starts_with("---")
        || line.starts_with("===")
        || line.starts_with("***")
        || line.starts_with("___")
}

/// Whitespace-delimited words, ignoring blank lines and heading/divider lines.
pub fn count_words(content: &str) -> u32 {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !is_marker_line(line))
        .map(|line| line.split_whitespace().count() as u32)
        .sum()
}

/// Whole seconds needed to speak `word_count` words at 2.33 words per second.
pub fn estimate_duration_secs(word_count: u32) -> u32 {
    (u64::from(word_count) * 100 / WORDS_PER_SECOND_X100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_common::{Pattern, Range, SessionConfig};
    use std::path::PathBuf;

    fn context(phase: &PhaseDefinition) -> GenerationContext {
        let pattern = Pattern::new("p", "P", vec![phase.clone()]);
        GenerationContext::new("s", SessionConfig::new("t"), &pattern, PathBuf::new())
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_count_words_skips_headings_dividers_and_blanks() {
        let content = "# Title\n\nOne two three\n---\n  four five\n## Sub\n";
        assert_eq!(count_words(content), 5);
    }

    #[test]
    fn test_duration_for_233_words_is_100_seconds() {
        assert_eq!(estimate_duration_secs(233), 100);
        assert_eq!(estimate_duration_secs(0), 0);
        assert_eq!(estimate_duration_secs(2), 0);
        assert_eq!(estimate_duration_secs(3), 1);
    }

    #[test]
    fn test_validate_reports_counts() {
        let phase = PhaseDefinition::new("a", "A", 1, Range::new(200, 300));
        let result = ContentValidator::new().validate(&words(233), &phase, &context(&phase));
        assert!(result.is_valid);
        assert_eq!(result.word_count, 233);
        assert_eq!(result.duration_secs, 100);
    }

    #[test]
    fn test_warnings_alone_keep_result_valid() {
        let phase = PhaseDefinition::new("a", "A", 1, Range::new(1, 50))
            .with_required_elements(vec!["call_to_action".into()]);
        let result = ContentValidator::new().validate(&words(10), &phase, &context(&phase));
        assert!(result.is_valid);
        assert_eq!(result.warnings().count(), 1);
    }

    #[test]
    fn test_any_error_invalidates() {
        let phase = PhaseDefinition::new("a", "A", 1, Range::new(1, 50))
            .with_forbidden_patterns(vec!["word".into()]);
        let result = ContentValidator::new().validate(&words(10), &phase, &context(&phase));
        assert!(!result.is_valid);
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_feedback_groups_must_and_should() {
        let phase = PhaseDefinition::new("a", "A", 1, Range::new(20, 50))
            .with_required_elements(vec!["summary".into()]);
        let validator = ContentValidator::new();
        let result = validator.validate(&words(10), &phase, &context(&phase));
        let feedback = validator.regeneration_feedback(&result);

        let must = feedback.find("MUST FIX:").unwrap();
        let should = feedback.find("SHOULD FIX:").unwrap();
        assert!(must < should);
        assert!(feedback.contains("- [WordCount]"));
        assert!(feedback.contains("- [RequiredElements]"));
        assert!(feedback.ends_with("Current word count: 10"));
    }

    #[test]
    fn test_feedback_empty_when_valid() {
        let phase = PhaseDefinition::new("a", "A", 1, Range::new(1, 50));
        let validator = ContentValidator::new();
        let result = validator.validate(&words(10), &phase, &context(&phase));
        assert_eq!(validator.regeneration_feedback(&result), "");
    }

    #[test]
    fn test_only_applicable_rules_run() {
        struct Never;
        impl ValidationRule for Never {
            fn category(&self) -> &'static str {
                "Never"
            }
            fn applies_to(&self, _phase: &PhaseDefinition) -> bool {
                false
            }
            fn validate(
                &self,
                _content: &str,
                _phase: &PhaseDefinition,
                _context: &GenerationContext,
            ) -> Vec<ValidationIssue> {
                panic!("must not run")
            }
        }

        let phase = PhaseDefinition::new("a", "A", 1, Range::new(1, 50));
        let validator = ContentValidator::new().add_rule(Box::new(Never));
        assert_eq!(validator.rule_count(), 4);
        assert!(validator.validate("hi", &phase, &context(&phase)).is_valid);
    }
}
