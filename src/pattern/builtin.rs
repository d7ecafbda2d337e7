use scribe_common::{Pattern, PhaseDefinition, Range};

/// Patterns available without any catalog files.
pub fn builtin_patterns() -> Vec<Pattern> {
    vec![explainer()]
}

/// Four-part explainer: hook, context, deep dive, closing.
pub fn explainer() -> Pattern {
    let mut pattern = Pattern::new(
        "explainer",
        "Explainer",
        vec![
            PhaseDefinition::new("hook", "Hook", 1, Range::new(60, 110))
                .with_duration(Range::new(25, 50))
                .with_forbidden_patterns(vec![
                    "in this video".into(),
                    "welcome back".into(),
                ])
                .with_instructions(
                    "Open with a surprising fact, question or image tied to the topic. \
                     Promise the viewer what they will understand by the end.",
                )
                .first(),
            PhaseDefinition::new("context", "Context", 2, Range::new(150, 260))
                .with_duration(Range::new(60, 115))
                .with_instructions(
                    "Give the background a newcomer needs: who, when, and what was \
                     known before. Keep it concrete.",
                ),
            PhaseDefinition::new("deep-dive", "Deep Dive", 3, Range::new(300, 520))
                .with_duration(Range::new(130, 225))
                .with_required_elements(vec!["example".into()])
                .with_instructions(
                    "Explain the core idea step by step. Use at least one worked \
                     example and name it as an example.",
                ),
            PhaseDefinition::new("closing", "Closing", 4, Range::new(80, 150))
                .with_duration(Range::new(35, 65))
                .with_required_elements(vec!["call_to_action".into()])
                .with_forbidden_patterns(vec!["in conclusion".into()])
                .with_instructions(
                    "Tie back to the opening hook, restate the key takeaway in one \
                     sentence, and end with a call to action.",
                ),
        ],
    )
    .with_global_rules(vec![
        "Conversational, second person, present tense".into(),
        "Short sentences that read well aloud".into(),
        "No lists, headings or markdown in the spoken text".into(),
    ]);
    pattern.description =
        "General-audience explainer that builds from a hook to a worked deep dive".into();
    pattern
}
