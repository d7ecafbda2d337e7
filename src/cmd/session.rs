//! Session commands: `scribe new|run|resume|regenerate|status|list|delete`.

use anyhow::{Context, Result};
use console::style;
use scribe::config::Config;
use scribe::errors::OrchestratorError;
use scribe::generation::build_generator;
use scribe::orchestrator::{JsonSessionStore, PhaseCoordinator, SessionOrchestrator};
use scribe::pattern::DirectoryPatternSource;
use scribe::ui::{SessionProgressUI, print_session_summary};
use scribe_common::{Session, SessionConfig, SessionStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct NewSessionArgs {
    pub topic: String,
    pub pattern: String,
    pub id: Option<String>,
    pub outline: Option<String>,
    pub outline_file: Option<PathBuf>,
    pub beats: Vec<String>,
    pub duration: Option<u32>,
    pub source: Option<String>,
    pub channel: Option<String>,
    pub run: bool,
}

enum Operation<'a> {
    Generate,
    Resume,
    Regenerate(&'a str),
}

fn build_orchestrator(config: &Config) -> Result<SessionOrchestrator> {
    let patterns = DirectoryPatternSource::load(&config.patterns_dir())?;
    for skipped in patterns.skipped() {
        tracing::warn!("skipped pattern file {}", skipped);
    }
    let store = JsonSessionStore::new(config.sessions_dir());
    let generator = build_generator(&config.toml.client, config.connection_policy())?;
    let coordinator =
        PhaseCoordinator::new(generator).with_settings(config.coordinator_settings());
    Ok(SessionOrchestrator::new(
        Arc::new(patterns),
        Arc::new(store),
        coordinator,
        config.output_root(),
    ))
}

/// Cancel the returned token on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping after the current step...");
            child.cancel();
        }
    });
    token
}

async fn require_session(orchestrator: &SessionOrchestrator, session_id: &str) -> Result<Session> {
    orchestrator
        .load_session(session_id)
        .await?
        .ok_or_else(|| {
            OrchestratorError::SessionNotFound {
                id: session_id.to_string(),
            }
            .into()
        })
}

async fn execute(config: &Config, session_id: &str, operation: Operation<'_>) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let session = require_session(&orchestrator, session_id).await?;

    let ui = Arc::new(SessionProgressUI::new(
        session.total_phases() as u64,
        config.verbose,
    ));
    if !matches!(operation, Operation::Regenerate(_)) {
        ui.set_completed(session.completed_count() as u64);
    }
    let subscription = ui.attach(orchestrator.bus(), session_id);
    let cancel = cancel_on_ctrl_c();

    let result = match operation {
        Operation::Generate => orchestrator.generate_all(session_id, &cancel).await,
        Operation::Resume => orchestrator.resume(session_id, &cancel).await,
        Operation::Regenerate(phase_id) => {
            orchestrator
                .regenerate_phase(session_id, phase_id, &cancel)
                .await
        }
    };
    drop(subscription);

    match result {
        Ok(session) => {
            ui.print_summary(&session);
            Ok(())
        }
        Err(OrchestratorError::Cancelled) => {
            ui.cancelled();
            println!(
                "Generation cancelled. Continue with: scribe resume {}",
                session_id
            );
            Ok(())
        }
        Err(err) => {
            if let Ok(Some(session)) = orchestrator.load_session(session_id).await
                && session.status == SessionStatus::Failed
            {
                print_session_summary(&session);
            }
            Err(err.into())
        }
    }
}

pub async fn cmd_new(config: &Config, args: NewSessionArgs) -> Result<()> {
    let outline = match (&args.outline, &args.outline_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read outline file {}", path.display()))?,
        ),
        (None, None) => None,
    };

    let mut session_config = SessionConfig::new(&args.topic).with_beats(args.beats);
    session_config.outline = outline;
    session_config.target_duration_minutes = args.duration;
    session_config.source_reference = args.source;
    session_config.channel = args.channel;

    let orchestrator = build_orchestrator(config)?;
    let (session, _) = orchestrator
        .initialize_session(session_config, &args.pattern, args.id.as_deref())
        .await?;

    println!(
        "Created session {} ({} phases, pattern '{}')",
        style(&session.id).green().bold(),
        session.total_phases(),
        session.pattern_id
    );
    println!("  Output: {}", session.output_dir.display());

    if args.run {
        execute(config, &session.id, Operation::Generate).await
    } else {
        println!("Run it with: scribe run {}", session.id);
        Ok(())
    }
}

pub async fn cmd_run(config: &Config, session_id: &str) -> Result<()> {
    execute(config, session_id, Operation::Generate).await
}

pub async fn cmd_resume(config: &Config, session_id: &str) -> Result<()> {
    execute(config, session_id, Operation::Resume).await
}

pub async fn cmd_regenerate(config: &Config, session_id: &str, phase_id: &str) -> Result<()> {
    execute(config, session_id, Operation::Regenerate(phase_id)).await
}

pub async fn cmd_status(config: &Config, session_id: &str, json: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let session = require_session(&orchestrator, session_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!();
    println!("Session:  {}", style(&session.id).bold());
    println!("Topic:    {}", session.config.topic);
    println!("Pattern:  {}", session.pattern_id);
    println!("Status:   {}", session.status);
    println!(
        "Progress: {}/{} phases",
        session.completed_count(),
        session.total_phases()
    );
    print_session_summary(&session);
    Ok(())
}

pub async fn cmd_list(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let sessions = orchestrator.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions yet. Create one with: scribe new <topic>");
        return Ok(());
    }

    println!();
    println!(
        "{:<38} {:<12} {:<10} {:>7}  {}",
        style("ID").bold(),
        style("PATTERN").bold(),
        style("STATUS").bold(),
        style("PHASES").bold(),
        style("TOPIC").bold()
    );
    for summary in sessions {
        let status = match summary.status {
            SessionStatus::Completed => style(summary.status.to_string()).green(),
            SessionStatus::Failed => style(summary.status.to_string()).red(),
            SessionStatus::Running => style(summary.status.to_string()).cyan(),
            SessionStatus::Pending => style(summary.status.to_string()).dim(),
        };
        println!(
            "{:<38} {:<12} {:<10} {:>3}/{:<3}  {}",
            summary.id,
            summary.pattern_id,
            status,
            summary.completed_phases,
            summary.total_phases,
            summary.topic
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_delete(config: &Config, session_id: &str, force: bool) -> Result<()> {
    use dialoguer::Confirm;

    let orchestrator = build_orchestrator(config)?;
    require_session(&orchestrator, session_id).await?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' and all of its content?",
                session_id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Delete cancelled");
            return Ok(());
        }
    }

    orchestrator.delete_session(session_id).await?;
    println!("Deleted session {}", session_id);
    Ok(())
}
