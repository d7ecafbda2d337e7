//! Configuration for scribe.
//!
//! Settings are layered file → environment → CLI. The file is `scribe.toml`
//! (explicit `--config` path, else `./scribe.toml`, else built-in defaults).
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = ".scribe"
//! patterns_dir = ".scribe/patterns"
//!
//! [generation]
//! max_retries = 2
//! temperature = 0.7
//! max_tokens_cap = 8000
//! backoff_base_ms = 1000
//!
//! [client]
//! kind = "http"
//! endpoint = "http://localhost:11434/v1/chat/completions"
//! model = "llama3"
//! api_key_env = "SCRIBE_API_KEY"
//! timeout_secs = 300
//!
//! [connection]
//! markers = ["connection", "failed to reach"]
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! Environment overrides: `SCRIBE_DATA_DIR`, `SCRIBE_ENDPOINT`,
//! `SCRIBE_MODEL`, `SCRIBE_MAX_RETRIES`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generation::ConnectionPolicy;
use crate::orchestrator::CoordinatorSettings;

pub const CONFIG_FILE_NAME: &str = "scribe.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Root for `sessions/` and `output/`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Pattern catalog directory (default: `<data_dir>/patterns`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".scribe")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            patterns_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Retries after the first attempt of each phase
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: u32,
    /// Connection backoff waits `base * 2^attempt`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens_cap() -> u32 {
    8000
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens_cap: default_max_tokens_cap(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    Http,
    /// Local CLI reading the prompt on stdin
    Command,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientKind::Http => write!(f, "http"),
            ClientKind::Command => write!(f, "command"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub kind: ClientKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("SCRIBE_API_KEY".to_string())
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kind: ClientKind::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            command: default_command(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSection {
    /// Lowercase substrings of a failure message that mark it as a connection problem
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

fn default_markers() -> Vec<String> {
    ConnectionPolicy::default().markers().to_vec()
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}': expected text or json", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Daily-rolling log file, in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// The complete scribe.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScribeToml {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScribeToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse scribe.toml")
    }

    /// Load `dir/scribe.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize scribe.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        if let Some(dir) = lookup("SCRIBE_DATA_DIR").filter(|v| !v.is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = lookup("SCRIBE_ENDPOINT").filter(|v| !v.is_empty()) {
            self.client.endpoint = endpoint;
        }
        if let Some(model) = lookup("SCRIBE_MODEL").filter(|v| !v.is_empty()) {
            self.client.model = model;
        }
        if let Some(retries) = lookup("SCRIBE_MAX_RETRIES") {
            match retries.trim().parse() {
                Ok(n) => self.generation.max_retries = n,
                Err(_) => warnings.push(format!(
                    "Ignoring SCRIBE_MAX_RETRIES='{}': not a non-negative integer",
                    retries
                )),
            }
        }
        warnings
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            warnings.push(format!(
                "generation.temperature {} is outside 0.0-2.0",
                self.generation.temperature
            ));
        }
        if self.generation.max_tokens_cap == 0 {
            warnings.push("generation.max_tokens_cap is 0; every request would be empty".into());
        }
        if self.generation.max_retries > 10 {
            warnings.push(format!(
                "generation.max_retries {} is high; connection backoff doubles each retry",
                self.generation.max_retries
            ));
        }
        match self.client.kind {
            ClientKind::Http if self.client.endpoint.trim().is_empty() => {
                warnings.push("client.endpoint is empty but client.kind is http".into());
            }
            ClientKind::Command if self.client.command.trim().is_empty() => {
                warnings.push("client.command is empty but client.kind is command".into());
            }
            _ => {}
        }
        if self.client.timeout_secs == 0 {
            warnings.push("client.timeout_secs is 0; every call would time out".into());
        }
        if self.connection.markers.iter().all(|m| m.trim().is_empty()) {
            warnings.push(
                "connection.markers is empty; command failures will never be treated as connection errors"
                    .into(),
            );
        }
        if self
            .logging
            .level
            .parse::<tracing_subscriber::filter::LevelFilter>()
            .is_err()
        {
            warnings.push(format!("Invalid logging.level '{}'", self.logging.level));
        }

        warnings
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The file the settings came from, if any
    pub config_path: Option<PathBuf>,
    pub toml: ScribeToml,
    pub verbose: bool,
    /// Problems found while layering overrides
    pub warnings: Vec<String>,
}

impl Config {
    /// Layer file, process environment and CLI flags.
    pub fn with_cli_args(
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        verbose: bool,
        log_format: Option<LogFormat>,
    ) -> Result<Self> {
        let mut config = Self::from_sources(config_path, |key| std::env::var(key).ok())?;
        if let Some(dir) = data_dir {
            config.toml.storage.data_dir = dir;
        }
        if let Some(format) = log_format {
            config.toml.logging.format = format;
        }
        if verbose {
            config.toml.logging.level = "debug".to_string();
        }
        config.verbose = verbose;
        Ok(config)
    }

    /// File then environment, with the environment read through `lookup`.
    pub fn from_sources<F>(config_path: Option<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (toml, config_path) = match config_path {
            Some(path) => (ScribeToml::load(&path)?, Some(path)),
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() {
                    (ScribeToml::load(&local)?, Some(local))
                } else {
                    (ScribeToml::default(), None)
                }
            }
        };

        let mut config = Self {
            config_path,
            toml,
            verbose: false,
            warnings: Vec::new(),
        };
        config.warnings = config.toml.apply_env(lookup);
        Ok(config)
    }

    pub fn data_dir(&self) -> &Path {
        &self.toml.storage.data_dir
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }

    /// Parent of every session's output directory.
    pub fn output_root(&self) -> PathBuf {
        self.data_dir().join("output")
    }

    pub fn patterns_dir(&self) -> PathBuf {
        self.toml
            .storage
            .patterns_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("patterns"))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let generation = &self.toml.generation;
        CoordinatorSettings {
            max_retries: generation.max_retries,
            temperature: generation.temperature,
            max_tokens_cap: generation.max_tokens_cap,
            backoff_base: Duration::from_millis(generation.backoff_base_ms),
        }
    }

    pub fn connection_policy(&self) -> ConnectionPolicy {
        ConnectionPolicy::new(self.toml.connection.markers.clone())
    }

    /// File warnings plus override warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.warnings.clone();
        warnings.extend(self.toml.validate());
        warnings
    }
}
