//! Pattern catalog.
//!
//! A pattern is read-only input to the orchestrator: it is looked up when a
//! session is created and again on every generation call.
//!
//! | Submodule   | What it owns                                              |
//! |-------------|-----------------------------------------------------------|
//! | `directory` | `DirectoryPatternSource`, TOML/YAML/JSON files on disk    |
//! | `builtin`   | patterns compiled into the binary                         |

pub mod builtin;
pub mod directory;

use scribe_common::Pattern;
use std::collections::BTreeMap;

pub use builtin::builtin_patterns;
pub use directory::DirectoryPatternSource;

pub trait PatternSource: Send + Sync {
    /// Known pattern ids, sorted.
    fn list_patterns(&self) -> Vec<String>;

    fn get_pattern(&self, id: &str) -> Option<Pattern>;
}

/// Patterns held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPatternSource {
    patterns: BTreeMap<String, Pattern>,
}

impl InMemoryPatternSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        let mut source = Self::new();
        for pattern in builtin_patterns() {
            source.insert(pattern);
        }
        source
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.insert(pattern);
        self
    }

    /// Add or replace the pattern with the same id.
    pub fn insert(&mut self, pattern: Pattern) {
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl PatternSource for InMemoryPatternSource {
    fn list_patterns(&self) -> Vec<String> {
        self.patterns.keys().cloned().collect()
    }

    fn get_pattern(&self, id: &str) -> Option<Pattern> {
        self.patterns.get(id).cloned()
    }
}
