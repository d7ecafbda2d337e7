//! Pattern files on disk.
//!
//! Every `*.toml`, `*.yaml`, `*.yml` and `*.json` file in a catalog directory
//! holds one pattern. The pattern id defaults to the file stem. Files that
//! fail to parse or validate are skipped with a warning.
//!
//! Lookup order, later entries replacing earlier ones with the same id:
//! built-in patterns, `~/.scribe/patterns`, then the configured directory.

use anyhow::{Context, Result, bail};
use glob::glob;
use scribe_common::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{InMemoryPatternSource, PatternSource};

const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// The user-wide catalog directory (`~/.scribe/patterns`).
pub fn global_patterns_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".scribe").join("patterns"))
}

pub struct DirectoryPatternSource {
    dirs: Vec<PathBuf>,
    patterns: InMemoryPatternSource,
    skipped: Vec<String>,
}

impl DirectoryPatternSource {
    /// Built-ins plus `~/.scribe/patterns` plus `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut dirs = Vec::new();
        if let Some(global) = global_patterns_dir() {
            dirs.push(global);
        }
        dirs.push(dir.to_path_buf());
        Self::load_dirs(InMemoryPatternSource::builtin(), dirs)
    }

    /// Only the files in `dir`, no built-ins.
    pub fn load_only(dir: &Path) -> Result<Self> {
        Self::load_dirs(InMemoryPatternSource::new(), vec![dir.to_path_buf()])
    }

    fn load_dirs(mut patterns: InMemoryPatternSource, dirs: Vec<PathBuf>) -> Result<Self> {
        let mut skipped = Vec::new();
        for dir in &dirs {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "pattern directory not present");
                continue;
            }
            for path in pattern_files(dir)? {
                match load_pattern_file(&path) {
                    Ok(pattern) => {
                        debug!(id = %pattern.id, path = %path.display(), "loaded pattern");
                        patterns.insert(pattern);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %format!("{:#}", e), "skipping pattern file");
                        skipped.push(format!("{}: {:#}", path.display(), e));
                    }
                }
            }
        }
        Ok(Self {
            dirs,
            patterns,
            skipped,
        })
    }

    /// Directories consulted, lowest precedence first.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Files that were rejected, with the reason.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

impl PatternSource for DirectoryPatternSource {
    fn list_patterns(&self) -> Vec<String> {
        self.patterns.list_patterns()
    }

    fn get_pattern(&self, id: &str) -> Option<Pattern> {
        self.patterns.get_pattern(id)
    }
}

fn pattern_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ext in EXTENSIONS {
        let pattern = dir.join(format!("*.{}", ext)).to_string_lossy().to_string();
        files.extend(
            glob(&pattern)
                .context("Failed to read glob pattern")?
                .filter_map(|entry| entry.ok()),
        );
    }
    files.sort();
    Ok(files)
}

/// Parse one pattern file by extension and validate it.
pub fn load_pattern_file(path: &Path) -> Result<Pattern> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pattern file {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut pattern: Pattern = match ext.as_str() {
        "toml" => toml::from_str(&content).context("Invalid TOML pattern")?,
        "yaml" | "yml" => serde_yaml::from_str(&content).context("Invalid YAML pattern")?,
        "json" => serde_json::from_str(&content).context("Invalid JSON pattern")?,
        other => bail!("Unsupported pattern file extension '{}'", other),
    };

    if pattern.id.trim().is_empty() {
        pattern.id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
    }
    pattern.validate()?;
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TOML_PATTERN: &str = r#"
name = "Listicle"
global_rules = ["Energetic"]

[[phases]]
id = "intro"
name = "Intro"
order = 1
word_count = { min = 20, max = 40 }

[[phases]]
id = "items"
name = "Items"
order = 2
word_count = { min = 100, max = 200 }
required_elements = ["number_one"]
"#;

    const YAML_PATTERN: &str = r#"
id: story
name: Story
phases:
  - id: setup
    name: Setup
    order: 1
    word_count: { min: 50, max: 80 }
  - id: payoff
    name: Payoff
    order: 2
    word_count: { min: 50, max: 80 }
"#;

    #[test]
    fn test_load_toml_uses_file_stem_as_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("listicle.toml");
        fs::write(&path, TOML_PATTERN).unwrap();
        let pattern = load_pattern_file(&path).unwrap();
        assert_eq!(pattern.id, "listicle");
        assert_eq!(pattern.phases.len(), 2);
        assert_eq!(pattern.phases[1].required_elements, vec!["number_one"]);
    }

    #[test]
    fn test_load_yaml_keeps_declared_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("whatever.yml");
        fs::write(&path, YAML_PATTERN).unwrap();
        assert_eq!(load_pattern_file(&path).unwrap().id, "story");
    }

    #[test]
    fn test_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        fs::write(
            &path,
            r#"{"name":"Tiny","phases":[{"id":"a","name":"A","order":1,"word_count":{"min":1,"max":5}}]}"#,
        )
        .unwrap();
        assert_eq!(load_pattern_file(&path).unwrap().id, "tiny");
    }

    #[test]
    fn test_directory_skips_invalid_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("listicle.toml"), TOML_PATTERN).unwrap();
        fs::write(dir.path().join("story.yaml"), YAML_PATTERN).unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(
            dir.path().join("empty.toml"),
            "name = \"Empty\"\nphases = []\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "# not a pattern").unwrap();

        let source = DirectoryPatternSource::load_only(dir.path()).unwrap();
        assert_eq!(source.list_patterns(), vec!["listicle", "story"]);
        assert_eq!(source.skipped().len(), 2);
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("explainer.toml"),
            TOML_PATTERN.replace("Listicle", "My Explainer"),
        )
        .unwrap();
        let source = DirectoryPatternSource::load(dir.path()).unwrap();
        assert_eq!(source.get_pattern("explainer").unwrap().name, "My Explainer");
    }

    #[test]
    fn test_missing_directory_yields_builtins() {
        let dir = tempdir().unwrap();
        let source = DirectoryPatternSource::load(&dir.path().join("nope")).unwrap();
        assert!(source.get_pattern("explainer").is_some());
    }
}
