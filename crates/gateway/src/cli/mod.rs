pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};

/// chatcore — a conversation orchestrator core for an AI coding assistant.
#[derive(Debug, Parser)]
#[command(name = "chatcore", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive chat REPL (default when no subcommand is given).
    Chat {
        /// Session id to resume, or a fresh one if omitted.
        #[arg(long)]
        session: Option<String>,
        /// Model override (e.g. "claude-sonnet").
        #[arg(long)]
        model: Option<String>,
        /// Provider id override.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Loads configuration from the path named by `CHATCORE_CONFIG` (or
/// `config.toml` by default). Shared by `chat` and `config` subcommands so
/// the logic lives in one place.
pub fn load_config() -> anyhow::Result<(chatcore_domain::config::Config, String)> {
    let config_path = std::env::var("CHATCORE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        chatcore_domain::config::Config::default()
    };

    Ok((config, config_path))
}
