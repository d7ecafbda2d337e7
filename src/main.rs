use anyhow::Result;
use clap::{Parser, Subcommand};
use scribe::config::LogFormat;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(version, about = "Resumable multi-phase content generator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to scribe.toml. Defaults to ./scribe.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for sessions, output and local patterns. Overrides storage.data_dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log output format: text or json
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a session for a topic
    New {
        /// What the content is about
        topic: String,

        /// Pattern to follow
        #[arg(short, long, default_value = "explainer")]
        pattern: String,

        /// Session id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Outline text, one point per line
        #[arg(long, conflicts_with = "outline_file")]
        outline: Option<String>,

        /// Read the outline from a file
        #[arg(long)]
        outline_file: Option<PathBuf>,

        /// Story beat, repeatable; distributed across phases in order
        #[arg(long = "beat")]
        beats: Vec<String>,

        /// Target length in minutes
        #[arg(long)]
        duration: Option<u32>,

        /// Source the content is based on
        #[arg(long)]
        source: Option<String>,

        /// Channel or publication name
        #[arg(long)]
        channel: Option<String>,

        /// Start generating right away
        #[arg(long)]
        run: bool,
    },
    /// Generate every phase of a session from the first unfinished one
    Run { session_id: String },
    /// Continue a session, reusing the content of completed phases
    Resume { session_id: String },
    /// Generate one phase again
    Regenerate {
        session_id: String,
        phase_id: String,
    },
    /// Show a session's phases and totals
    Status {
        session_id: String,

        /// Print the session record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List sessions
    List,
    /// Delete a session and its output
    Delete {
        session_id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// List or show patterns
    Patterns {
        #[command(subcommand)]
        command: Option<PatternsCommands>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum PatternsCommands {
    /// List available patterns
    List,
    /// Show the phases of a pattern
    Show { id: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default scribe.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = scribe::config::Config::with_cli_args(
        cli.config.clone(),
        cli.data_dir.clone(),
        cli.verbose,
        cli.log_format,
    )?;
    let _log_guard = scribe::logging::init(&config.toml.logging)?;
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    match &cli.command {
        Commands::New {
            topic,
            pattern,
            id,
            outline,
            outline_file,
            beats,
            duration,
            source,
            channel,
            run,
        } => {
            let args = cmd::NewSessionArgs {
                topic: topic.clone(),
                pattern: pattern.clone(),
                id: id.clone(),
                outline: outline.clone(),
                outline_file: outline_file.clone(),
                beats: beats.clone(),
                duration: *duration,
                source: source.clone(),
                channel: channel.clone(),
                run: *run,
            };
            cmd::cmd_new(&config, args).await?;
        }
        Commands::Run { session_id } => cmd::cmd_run(&config, session_id).await?,
        Commands::Resume { session_id } => cmd::cmd_resume(&config, session_id).await?,
        Commands::Regenerate {
            session_id,
            phase_id,
        } => cmd::cmd_regenerate(&config, session_id, phase_id).await?,
        Commands::Status { session_id, json } => {
            cmd::cmd_status(&config, session_id, *json).await?
        }
        Commands::List => cmd::cmd_list(&config).await?,
        Commands::Delete { session_id, force } => {
            cmd::cmd_delete(&config, session_id, *force).await?
        }
        Commands::Patterns { command } => cmd::cmd_patterns(&config, command.clone())?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
