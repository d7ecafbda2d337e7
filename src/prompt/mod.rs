//! Prompt rendering and output formatting.
//!
//! Both are pure string transformations the coordinator calls around each
//! generation attempt. An error from either counts as a non-connection
//! failure for that attempt.
//!
//! | Submodule | What it owns                                     |
//! |-----------|--------------------------------------------------|
//! | `render`  | `DefaultPromptRenderer`                          |
//! | `format`  | `PlainFormatter`                                 |

pub mod format;
pub mod render;

use anyhow::Result;
use scribe_common::PhaseDefinition;

use crate::orchestrator::{GenerationContext, PhaseLocalContext};
pub use format::PlainFormatter;
pub use render::DefaultPromptRenderer;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

pub trait PromptRenderer: Send + Sync {
    fn render(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        local: &PhaseLocalContext,
    ) -> Result<RenderedPrompt>;

    /// Render a retry prompt with `feedback` placed ahead of the usual
    /// instructions.
    fn render_regeneration(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        local: &PhaseLocalContext,
        feedback: &str,
    ) -> Result<RenderedPrompt> {
        let base = self.render(phase, context, local)?;
        Ok(RenderedPrompt {
            system: base.system,
            user: format!("{}\n\n{}", feedback_block(feedback), base.user),
        })
    }
}

pub trait OutputFormatter: Send + Sync {
    fn format(
        &self,
        raw: &str,
        phase: &PhaseDefinition,
        context: &GenerationContext,
    ) -> Result<String>;
}

/// The corrections block that leads a regeneration prompt.
pub fn feedback_block(feedback: &str) -> String {
    format!(
        "## CORRECTIONS REQUIRED\n\
         Your previous attempt was rejected. Rewrite the section and fix every issue below.\n\n\
         {}",
        feedback.trim()
    )
}
