//! Generation through a local CLI process.
//!
//! The combined prompt goes to the child's stdin and its stdout is the
//! generated text. A non-zero exit is classified through the
//! [`ConnectionPolicy`] using the child's stderr.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ConnectionPolicy, GenerationError, GenerationRequest, TextGenerator};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    policy: ConnectionPolicy,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: &str, args: Vec<String>, policy: ConnectionPolicy) -> Self {
        Self {
            program: program.to_string(),
            args,
            policy,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn stdin_payload(request: &GenerationRequest) -> String {
        format!("{}\n\n{}", request.system_prompt, request.user_prompt)
    }

    async fn run(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("SCRIBE_MAX_TOKENS", request.max_tokens.to_string())
            .env("SCRIBE_TEMPERATURE", request.temperature.to_string())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GenerationError::connection(format!(
                    "failed to reach generator command '{}': {}",
                    self.program, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = Self::stdin_payload(request);
            match stdin.write_all(payload.as_bytes()).await {
                Ok(()) => {}
                // the child exited without reading; its exit status tells the rest
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(program = %self.program, "generator closed stdin early");
                }
                Err(e) => {
                    return Err(GenerationError::failed(format!(
                        "failed to write prompt to generator stdin: {}",
                        e
                    )));
                }
            }
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                GenerationError::failed(format!("failed to wait for generator: {}", e))
            })?,
            Err(_) => {
                return Err(GenerationError::connection(format!(
                    "generator command timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!(
                "generator exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
            return Err(GenerationError::new(self.policy.classify(&stderr), message));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.trim().is_empty() {
            return Err(GenerationError::empty());
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        debug!(program = %self.program, args = ?self.args, "running generator command");
        // dropping the run future kills the child
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::cancelled()),
            result = self.run(request) => result,
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}
