//! Text-generation clients.
//!
//! The orchestrator only needs one capability: turn a system prompt and a user
//! prompt into text, or fail. Failures carry a typed [`GenerationErrorKind`]
//! so the coordinator can tell availability problems (retried with backoff,
//! fatal once exhausted) from everything else (retried immediately, degraded
//! to a soft failure once exhausted) without inspecting message text.
//!
//! | Submodule  | What it owns                                            |
//! |------------|---------------------------------------------------------|
//! | `http`     | `HttpGenerator`, OpenAI-compatible chat completions     |
//! | `command`  | `CommandGenerator`, prompt on stdin of a CLI process    |
//! | `scripted` | `ScriptedGenerator`, canned replies for tests           |

pub mod command;
pub mod http;
pub mod scripted;

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ClientKind};
pub use command::CommandGenerator;
pub use http::HttpGenerator;
pub use scripted::ScriptedGenerator;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The service could not be reached or is unavailable
    Connection,
    /// The service answered but the call failed
    Failed,
    /// The call succeeded with no text
    Empty,
    Cancelled,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationErrorKind::Connection => write!(f, "connection error"),
            GenerationErrorKind::Failed => write!(f, "generation failed"),
            GenerationErrorKind::Empty => write!(f, "empty result"),
            GenerationErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Connection, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Failed, message)
    }

    pub fn empty() -> Self {
        Self::new(GenerationErrorKind::Empty, "generation returned no text")
    }

    pub fn cancelled() -> Self {
        Self::new(GenerationErrorKind::Cancelled, "generation cancelled")
    }

    pub fn is_connection(&self) -> bool {
        self.kind == GenerationErrorKind::Connection
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == GenerationErrorKind::Cancelled
    }
}

/// The single "generate text" capability the orchestrator consumes.
///
/// Real implementations: `HttpGenerator`, `CommandGenerator`.
/// Test double: `ScriptedGenerator`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Implementations must stop promptly once `cancel` fires and report
    /// [`GenerationErrorKind::Cancelled`].
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

/// Which free-text failure messages count as availability problems.
///
/// Only clients that receive untyped failures (a child process's stderr) need
/// this; the HTTP client classifies from typed transport errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPolicy {
    markers: Vec<String>,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::new(vec!["connection".to_string(), "failed to reach".to_string()])
    }
}

impl ConnectionPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn classify(&self, message: &str) -> GenerationErrorKind {
        let lower = message.to_lowercase();
        if self.markers.iter().any(|m| lower.contains(m)) {
            GenerationErrorKind::Connection
        } else {
            GenerationErrorKind::Failed
        }
    }
}

/// Build the configured client.
pub fn build_generator(
    config: &ClientConfig,
    policy: ConnectionPolicy,
) -> Result<Arc<dyn TextGenerator>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.kind {
        ClientKind::Http => {
            if config.endpoint.trim().is_empty() {
                bail!("client.endpoint must be set for the http client");
            }
            let api_key = config.api_key_env.as_deref().and_then(|var| std::env::var(var).ok());
            Ok(Arc::new(HttpGenerator::new(
                &config.endpoint,
                &config.model,
                api_key,
                timeout,
            )?))
        }
        ClientKind::Command => {
            if config.command.trim().is_empty() {
                bail!("client.command must be set for the command client");
            }
            Ok(Arc::new(
                CommandGenerator::new(&config.command, config.args.clone(), policy)
                    .with_timeout(timeout),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_classifies_case_insensitively() {
        let policy = ConnectionPolicy::default();
        assert_eq!(
            policy.classify("Connection refused (os error 111)"),
            GenerationErrorKind::Connection
        );
        assert_eq!(
            policy.classify("Failed to reach api.example.com"),
            GenerationErrorKind::Connection
        );
        assert_eq!(
            policy.classify("invalid model name"),
            GenerationErrorKind::Failed
        );
    }

    #[test]
    fn test_policy_is_configurable() {
        let policy = ConnectionPolicy::new(vec!["Overloaded".into(), "".into()]);
        assert_eq!(policy.markers(), &["overloaded".to_string()]);
        assert_eq!(
            policy.classify("server overloaded, retry later"),
            GenerationErrorKind::Connection
        );
        assert_eq!(
            policy.classify("connection reset"),
            GenerationErrorKind::Failed
        );
    }

    #[test]
    fn test_error_display_includes_kind() {
        let err = GenerationError::connection("dns lookup failed");
        assert_eq!(err.to_string(), "connection error: dns lookup failed");
        assert!(err.is_connection());
        assert!(!GenerationError::empty().is_connection());
    }

    #[test]
    fn test_build_generator_rejects_missing_endpoint() {
        let config = ClientConfig {
            kind: ClientKind::Http,
            endpoint: String::new(),
            ..ClientConfig::default()
        };
        let err = build_generator(&config, ConnectionPolicy::default()).err().unwrap();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_build_generator_command() {
        let config = ClientConfig {
            kind: ClientKind::Command,
            command: "cat".into(),
            ..ClientConfig::default()
        };
        let generator = build_generator(&config, ConnectionPolicy::default()).unwrap();
        assert_eq!(generator.name(), "command");
    }
}
