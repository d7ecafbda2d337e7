use anyhow::Result;
use scribe_common::PhaseDefinition;

use super::OutputFormatter;
use crate::orchestrator::GenerationContext;

/// Normalises model output into plain script text.
///
/// Line endings become `\n`, trailing whitespace is trimmed per line, runs of
/// blank lines collapse to one, and a reply wrapped entirely in a code fence
/// is unwrapped.
#[derive(Debug, Clone, Default)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for PlainFormatter {
    fn format(
        &self,
        raw: &str,
        _phase: &PhaseDefinition,
        _context: &GenerationContext,
    ) -> Result<String> {
        Ok(normalize(raw))
    }
}

pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let body = strip_fence(unified.trim());

    let mut out = String::with_capacity(body.len());
    let mut blank_run = 0;
    for line in body.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn strip_fence(text: &str) -> &str {
    if !text.starts_with("```") || !text.ends_with("```") || text.len() < 6 {
        return text;
    }
    let Some(first_newline) = text.find('\n') else {
        return text;
    };
    let inner = &text[first_newline + 1..text.len() - 3];
    inner.trim_matches('\n')
}
