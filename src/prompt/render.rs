use anyhow::Result;
use scribe_common::PhaseDefinition;

use super::{PromptRenderer, RenderedPrompt};
use crate::orchestrator::{GenerationContext, PhaseLocalContext};

/// Characters of the previous phase carried into the next prompt.
const PREVIOUS_TAIL_CHARS: usize = 1200;

/// Markdown-sectioned prompts assembled from the phase, the session inputs
/// and whatever earlier phases produced.
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptRenderer;

impl DefaultPromptRenderer {
    pub fn new() -> Self {
        Self
    }

    fn system_prompt(&self, context: &GenerationContext) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "You are writing one section of a spoken script in the \"{}\" format.\n\
             Write only the words to be spoken. No stage directions, no commentary about the task.\n",
            context.pattern.name
        ));
        if !context.pattern.global_rules.is_empty() {
            prompt.push_str("\n## Style Rules\n");
            for rule in &context.pattern.global_rules {
                prompt.push_str(&format!("- {}\n", rule));
            }
        }
        prompt
    }

    fn user_prompt(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        local: &PhaseLocalContext,
    ) -> String {
        let config = &context.config;
        let mut prompt = String::new();

        let position = context
            .position(&phase.id)
            .map_or(phase.order as usize, |i| i + 1);
        prompt.push_str(&format!(
            "# Section {} of {}: {}\n\n",
            position,
            context.phases.len(),
            phase.name
        ));

        prompt.push_str("## Inputs\n\n");
        prompt.push_str(&format!("- **Topic**: {}\n", config.topic));
        if let Some(minutes) = config.target_duration_minutes {
            prompt.push_str(&format!("- **Total length**: about {} minutes\n", minutes));
        }
        if let Some(channel) = &config.channel {
            prompt.push_str(&format!("- **Channel**: {}\n", channel));
        }
        if let Some(source) = &config.source_reference {
            prompt.push_str(&format!("- **Source**: {}\n", source));
        }
        prompt.push('\n');

        prompt.push_str("## Targets\n\n");
        prompt.push_str(&format!("- **Words**: {}\n", phase.word_count));
        if let Some(duration) = &phase.duration_secs {
            prompt.push_str(&format!("- **Seconds**: {}\n", duration));
        }
        if phase.is_first_phase {
            prompt.push_str("- This is the opening section. Grab attention immediately.\n");
        }
        if phase.is_final_phase {
            prompt.push_str("- This is the final section. Bring the piece to a close.\n");
        }
        prompt.push('\n');

        if !phase.instructions.trim().is_empty() {
            prompt.push_str("## Instructions\n\n");
            prompt.push_str(phase.instructions.trim());
            prompt.push_str("\n\n");
        }

        if !local.outline_points.is_empty() {
            prompt.push_str("## Cover These Points\n\n");
            for point in &local.outline_points {
                prompt.push_str(&format!("- {}\n", point));
            }
            prompt.push('\n');
        }

        if !local.beats.is_empty() {
            prompt.push_str("## Story Beats\n\n");
            for beat in &local.beats {
                prompt.push_str(&format!("- {}\n", beat));
            }
            prompt.push('\n');
        }

        if !phase.required_elements.is_empty() {
            prompt.push_str("## Must Include\n\n");
            for element in &phase.required_elements {
                prompt.push_str(&format!("- {}\n", element.replace('_', " ")));
            }
            prompt.push('\n');
        }

        if !phase.forbidden_patterns.is_empty() {
            prompt.push_str("## Never Use\n\n");
            for pattern in &phase.forbidden_patterns {
                prompt.push_str(&format!("- \"{}\"\n", pattern));
            }
            prompt.push('\n');
        }

        if let (Some(name), Some(content)) = (&local.previous_phase_name, &local.previous_content) {
            prompt.push_str(&format!("## Previous Section ({})\n\n", name));
            prompt.push_str("Continue naturally from where this left off:\n\n");
            prompt.push_str(tail(content, PREVIOUS_TAIL_CHARS).trim());
            prompt.push_str("\n\n");
        }

        if !local.anti_repetition.is_empty() {
            prompt.push_str("## Openings Already Used\n\n");
            prompt.push_str("Do not start the same way as any of these:\n");
            for opening in &local.anti_repetition {
                prompt.push_str(&format!("- {}\n", opening));
            }
            prompt.push('\n');
        }

        prompt.push_str("Write the section now.");
        prompt
    }
}

impl PromptRenderer for DefaultPromptRenderer {
    fn render(
        &self,
        phase: &PhaseDefinition,
        context: &GenerationContext,
        local: &PhaseLocalContext,
    ) -> Result<RenderedPrompt> {
        Ok(RenderedPrompt {
            system: self.system_prompt(context),
            user: self.user_prompt(phase, context, local),
        })
    }
}

/// The last `max` characters of `s`.
fn tail(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    match s.char_indices().nth(count - max) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::CompletedPhase;
    use scribe_common::{Pattern, Range, SessionConfig};
    use std::path::PathBuf;

    fn context() -> GenerationContext {
        let pattern = Pattern::new(
            "explainer",
            "Explainer",
            vec![
                PhaseDefinition::new("hook", "Hook", 1, Range::new(40, 60)).first(),
                PhaseDefinition::new("closing", "Closing", 2, Range::new(80, 120))
                    .with_required_elements(vec!["call_to_action".into()])
                    .with_forbidden_patterns(vec!["in conclusion".into()]),
            ],
        )
        .with_global_rules(vec!["Second person, present tense".into()]);
        let mut config = SessionConfig::new("Why the sky is blue");
        config.channel = Some("SkyFacts".into());
        GenerationContext::new("s1", config, &pattern, PathBuf::new())
    }

    #[test]
    fn test_system_prompt_carries_global_rules() {
        let ctx = context();
        let hook = ctx.phase("hook").unwrap().clone();
        let local = PhaseLocalContext::assemble(&hook, &ctx, 0, "");
        let prompt = DefaultPromptRenderer::new().render(&hook, &ctx, &local).unwrap();
        assert!(prompt.system.contains("\"Explainer\""));
        assert!(prompt.system.contains("- Second person, present tense"));
    }

    #[test]
    fn test_user_prompt_for_final_phase() {
        let mut ctx = context();
        ctx.push_completed(CompletedPhase {
            phase_id: "hook".into(),
            name: "Hook".into(),
            order: 1,
            content: "Look up. The sky is lying to you.".into(),
            word_count: 8,
            duration_secs: 3,
        });
        let closing = ctx.phase("closing").unwrap().clone();
        let local = PhaseLocalContext::assemble(&closing, &ctx, 0, "");
        let user = DefaultPromptRenderer::new()
            .render(&closing, &ctx, &local)
            .unwrap()
            .user;

        assert!(user.starts_with("# Section 2 of 2: Closing"));
        assert!(user.contains("- **Topic**: Why the sky is blue"));
        assert!(user.contains("- **Channel**: SkyFacts"));
        assert!(user.contains("- **Words**: 80-120"));
        assert!(user.contains("final section"));
        assert!(user.contains("- call to action"));
        assert!(user.contains("- \"in conclusion\""));
        assert!(user.contains("## Previous Section (Hook)"));
        assert!(user.contains("- Look up."));
    }

    #[test]
    fn test_regeneration_prepends_feedback() {
        let ctx = context();
        let hook = ctx.phase("hook").unwrap().clone();
        let local = PhaseLocalContext::assemble(&hook, &ctx, 1, "MUST FIX:\n- [WordCount] too short");
        let prompt = DefaultPromptRenderer::new()
            .render_regeneration(&hook, &ctx, &local, &local.feedback)
            .unwrap();
        assert!(prompt.user.starts_with("## CORRECTIONS REQUIRED"));
        assert!(prompt.user.contains("- [WordCount] too short"));
        assert!(prompt.user.contains("# Section 1 of 2: Hook"));
    }

    #[test]
    fn test_section_number_is_position_not_order() {
        let pattern = Pattern::new(
            "spaced",
            "Spaced",
            vec![
                PhaseDefinition::new("intro", "Intro", 10, Range::new(10, 20)),
                PhaseDefinition::new("middle", "Middle", 20, Range::new(10, 20)),
                PhaseDefinition::new("outro", "Outro", 30, Range::new(10, 20)),
            ],
        );
        let ctx = GenerationContext::new("s1", SessionConfig::new("t"), &pattern, PathBuf::new());
        let middle = ctx.phase("middle").unwrap().clone();
        let local = PhaseLocalContext::assemble(&middle, &ctx, 0, "");
        let user = DefaultPromptRenderer::new()
            .render(&middle, &ctx, &local)
            .unwrap()
            .user;
        assert!(user.starts_with("# Section 2 of 3: Middle"));
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("héllo", 3), "llo");
        assert_eq!(tail("hi", 10), "hi");
    }
}
