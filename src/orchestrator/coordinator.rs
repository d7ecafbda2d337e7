//! Single-phase execution: render, generate, format, validate, retry.
//!
//! [`PhaseCoordinator::execute_phase`] runs one phase until it produces valid
//! content or the retry budget (`max_retries` retries after the first
//! attempt) runs out. Outcomes:
//!
//! - valid content: validated result, non-fatal issues as warnings
//! - still invalid after the last attempt: soft failure, the last content
//!   marked unvalidated with every issue as a warning
//! - non-connection client failure on the last attempt: soft failure with the
//!   error text as a warning
//! - connection failure on the last attempt: [`PhaseError::Connection`]
//!
//! Connection failures wait `backoff_base * 2^attempt` before the next
//! attempt; other failures retry immediately. Cancellation interrupts both the
//! generation call and the backoff wait.

use scribe_common::PhaseDefinition;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::{CompletedPhase, GenerationContext, PhaseLocalContext};
use crate::errors::PhaseError;
use crate::generation::{GenerationError, GenerationRequest, TextGenerator};
use crate::prompt::{DefaultPromptRenderer, OutputFormatter, PlainFormatter, PromptRenderer};
use crate::validation::{ContentValidator, count_words, estimate_duration_secs};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_MAX_TOKENS_CAP: u32 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub max_retries: u32,
    pub temperature: f32,
    /// Upper bound on the per-call token budget
    pub max_tokens_cap: u32,
    /// First backoff wait after a connection failure
    pub backoff_base: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: 0.7,
            max_tokens_cap: DEFAULT_MAX_TOKENS_CAP,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl CoordinatorSettings {
    /// `min(2 * max_words + 500, cap)`
    pub fn token_budget(&self, phase: &PhaseDefinition) -> u32 {
        phase
            .word_count
            .max
            .saturating_mul(2)
            .saturating_add(500)
            .min(self.max_tokens_cap)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// What one phase execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPhase {
    pub phase_id: String,
    pub name: String,
    pub order: u32,
    pub content: String,
    pub word_count: u32,
    pub duration_secs: u32,
    pub validated: bool,
    pub warnings: Vec<String>,
    /// Generation attempts made, including failed ones
    pub attempts: u32,
}

impl GeneratedPhase {
    fn new(
        phase: &PhaseDefinition,
        content: String,
        validated: bool,
        warnings: Vec<String>,
        attempts: u32,
    ) -> Self {
        let word_count = count_words(&content);
        Self {
            phase_id: phase.id.clone(),
            name: phase.name.clone(),
            order: phase.order,
            content,
            word_count,
            duration_secs: estimate_duration_secs(word_count),
            validated,
            warnings,
            attempts,
        }
    }

    pub fn to_completed(&self) -> CompletedPhase {
        CompletedPhase {
            phase_id: self.phase_id.clone(),
            name: self.name.clone(),
            order: self.order,
            content: self.content.clone(),
            word_count: self.word_count,
            duration_secs: self.duration_secs,
        }
    }
}

/// Drives one phase through the generate/validate loop.
///
/// Collaborators are trait objects so tests can swap any of them.
pub struct PhaseCoordinator {
    generator: Arc<dyn TextGenerator>,
    renderer: Arc<dyn PromptRenderer>,
    formatter: Arc<dyn OutputFormatter>,
    validator: Arc<ContentValidator>,
    settings: CoordinatorSettings,
}

impl PhaseCoordinator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            renderer: Arc::new(DefaultPromptRenderer::new()),
            formatter: Arc::new(PlainFormatter::new()),
            validator: Arc::new(ContentValidator::new()),
            settings: CoordinatorSettings::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn OutputFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn validator(&self) -> &ContentValidator {
        &self.validator
    }

    /// Run `phase` until it validates or `max_retries` retries are spent.
    pub async fn execute_phase(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> Result<GeneratedPhase, PhaseError> {
        let mut attempt: u32 = 0;
        let mut feedback = String::new();
        let mut last_content: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(PhaseError::Cancelled);
            }

            let local = PhaseLocalContext::assemble(phase, context, attempt, &feedback);
            debug!(
                session_id = %context.session_id,
                phase_id = %phase.id,
                attempt,
                retry = local.is_retry(),
                "generating phase content"
            );

            match self.attempt(phase, context, &local, cancel).await {
                Ok(content) => {
                    let result = self.validator.validate(&content, phase, context);
                    if result.is_valid {
                        info!(
                            session_id = %context.session_id,
                            phase_id = %phase.id,
                            attempt,
                            words = result.word_count,
                            "phase content validated"
                        );
                        return Ok(GeneratedPhase::new(
                            phase,
                            content,
                            true,
                            result.issue_messages(),
                            attempt + 1,
                        ));
                    }

                    if attempt < max_retries {
                        warn!(
                            session_id = %context.session_id,
                            phase_id = %phase.id,
                            attempt,
                            errors = result.errors().count(),
                            "validation failed, regenerating with feedback"
                        );
                        feedback = self.validator.regeneration_feedback(&result);
                        last_content = Some(content);
                        attempt += 1;
                        continue;
                    }

                    warn!(
                        session_id = %context.session_id,
                        phase_id = %phase.id,
                        attempts = attempt + 1,
                        "validation still failing after last attempt, keeping unvalidated content"
                    );
                    return Ok(GeneratedPhase::new(
                        phase,
                        content,
                        false,
                        result.issue_messages(),
                        attempt + 1,
                    ));
                }
                Err(err) if err.is_cancelled() => return Err(PhaseError::Cancelled),
                Err(err) => {
                    if attempt < max_retries {
                        warn!(
                            session_id = %context.session_id,
                            phase_id = %phase.id,
                            attempt,
                            error = %err,
                            "generation attempt failed"
                        );
                        if err.is_connection() {
                            let wait = self.settings.backoff(attempt);
                            debug!(phase_id = %phase.id, wait_ms = wait.as_millis() as u64, "backing off");
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => return Err(PhaseError::Cancelled),
                                _ = tokio::time::sleep(wait) => {}
                            }
                        }
                        attempt += 1;
                        continue;
                    }

                    if err.is_connection() {
                        return Err(PhaseError::Connection {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }

                    warn!(
                        session_id = %context.session_id,
                        phase_id = %phase.id,
                        error = %err,
                        "generation kept failing, continuing with degraded content"
                    );
                    return Ok(GeneratedPhase::new(
                        phase,
                        last_content.unwrap_or_default(),
                        false,
                        vec![format!("[Generation] {}", err)],
                        attempt + 1,
                    ));
                }
            }
        }
    }

    /// Render, generate and format once.
    async fn attempt(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        local: &PhaseLocalContext,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let rendered = if local.is_retry() {
            self.renderer
                .render_regeneration(phase, context, local, &local.feedback)
        } else {
            self.renderer.render(phase, context, local)
        };
        let prompt = rendered
            .map_err(|e| GenerationError::failed(format!("prompt rendering failed: {:#}", e)))?;

        let request = GenerationRequest {
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            max_tokens: self.settings.token_budget(phase),
            temperature: self.settings.temperature,
        };
        let raw = self.generator.generate(&request, cancel).await?;
        if raw.trim().is_empty() {
            return Err(GenerationError::empty());
        }

        self.formatter
            .format(&raw, phase, context)
            .map_err(|e| GenerationError::failed(format!("output formatting failed: {:#}", e)))
    }
}
