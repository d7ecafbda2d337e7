//! Pattern catalog commands: `scribe patterns`.

use anyhow::Result;
use console::style;
use scribe::config::Config;
use scribe::pattern::{DirectoryPatternSource, PatternSource};

use super::super::PatternsCommands;

pub fn cmd_patterns(config: &Config, command: Option<PatternsCommands>) -> Result<()> {
    let source = DirectoryPatternSource::load(&config.patterns_dir())?;

    match command {
        None | Some(PatternsCommands::List) => {
            let ids = source.list_patterns();
            println!();
            println!("Available patterns:");
            for id in &ids {
                if let Some(pattern) = source.get_pattern(id) {
                    println!(
                        "  {:<16} {} phases  {}",
                        style(id).cyan(),
                        pattern.phases.len(),
                        style(&pattern.description).dim()
                    );
                }
            }
            if !source.skipped().is_empty() {
                println!();
                println!("Skipped pattern files:");
                for skipped in source.skipped() {
                    println!("  {} {}", style("!").yellow(), skipped);
                }
            }
            println!();
        }
        Some(PatternsCommands::Show { id }) => match source.get_pattern(&id) {
            Some(pattern) => {
                println!();
                println!("{} ({})", style(&pattern.name).bold(), pattern.id);
                if !pattern.description.is_empty() {
                    println!("{}", pattern.description);
                }
                println!();
                for phase in pattern.ordered_phases() {
                    let mut flags = Vec::new();
                    if phase.is_first_phase {
                        flags.push("first");
                    }
                    if phase.is_final_phase {
                        flags.push("final");
                    }
                    println!(
                        "  {:02} {:<14} {}-{} words {}",
                        phase.order,
                        style(&phase.name).yellow(),
                        phase.word_count.min,
                        phase.word_count.max,
                        style(flags.join(", ")).dim()
                    );
                    if !phase.required_elements.is_empty() {
                        println!("       must include: {}", phase.required_elements.join(", "));
                    }
                    if !phase.forbidden_patterns.is_empty() {
                        println!("       never use: {}", phase.forbidden_patterns.join(", "));
                    }
                }
                if !pattern.global_rules.is_empty() {
                    println!();
                    println!("Style rules:");
                    for rule in &pattern.global_rules {
                        println!("  - {}", rule);
                    }
                }
                println!();
            }
            None => {
                println!("Pattern '{}' not found.", id);
                println!();
                println!("Run 'scribe patterns' to see available patterns.");
            }
        },
    }

    Ok(())
}
