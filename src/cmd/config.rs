//! Configuration view and validation commands: `scribe config`.

use anyhow::Result;
use scribe::config::{CONFIG_FILE_NAME, Config, ScribeToml};
use std::path::PathBuf;

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Scribe Configuration");
            println!("====================");
            println!();

            match &config.config_path {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No {} found, using defaults.", CONFIG_FILE_NAME),
            }
            println!();

            let toml = &config.toml;
            println!("[storage]");
            println!("  data_dir = \"{}\"", toml.storage.data_dir.display());
            println!("  patterns_dir = \"{}\"", config.patterns_dir().display());
            println!();

            println!("[generation]");
            println!("  max_retries = {}", toml.generation.max_retries);
            println!("  temperature = {}", toml.generation.temperature);
            println!("  max_tokens_cap = {}", toml.generation.max_tokens_cap);
            println!("  backoff_base_ms = {}", toml.generation.backoff_base_ms);
            println!();

            println!("[client]");
            println!("  kind = \"{}\"", toml.client.kind);
            println!("  endpoint = \"{}\"", toml.client.endpoint);
            println!("  model = \"{}\"", toml.client.model);
            if let Some(var) = &toml.client.api_key_env {
                let state = if std::env::var(var).is_ok() {
                    "set"
                } else {
                    "not set"
                };
                println!("  api_key_env = \"{}\" ({})", var, state);
            }
            println!("  command = \"{}\"", toml.client.command);
            println!("  args = {:?}", toml.client.args);
            println!("  timeout_secs = {}", toml.client.timeout_secs);
            println!();

            println!("[connection]");
            println!("  markers = {:?}", toml.connection.markers);
            println!();

            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  format = \"{:?}\"", toml.logging.format);
            if let Some(file) = &toml.logging.file {
                println!("  file = \"{}\"", file.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let path = config
                .config_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            ScribeToml::default().save(&path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, path.display());
            println!();
            println!("You can now customize:");
            println!("  - [client] kind, endpoint, model or command");
            println!("  - [generation] max_retries, temperature, max_tokens_cap");
            println!("  - [storage] data_dir, patterns_dir");
            println!();
        }
    }

    Ok(())
}
