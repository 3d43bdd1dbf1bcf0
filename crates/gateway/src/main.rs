use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatcore_gateway::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing();
            let (config, _path) = chatcore_gateway::cli::load_config()?;
            let session = uuid::Uuid::new_v4().to_string();
            chatcore_gateway::cli::chat::chat(Arc::new(config), session, None, None).await
        }
        Some(Command::Chat { session, model, provider }) => {
            init_tracing();
            let (config, _path) = chatcore_gateway::cli::load_config()?;
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            chatcore_gateway::cli::chat::chat(Arc::new(config), session, model, provider).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, path) = chatcore_gateway::cli::load_config()?;
            let valid = chatcore_gateway::cli::config::validate(&config, &path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = chatcore_gateway::cli::load_config()?;
            chatcore_gateway::cli::config::show(&config);
            Ok(())
        }
    }
}

/// Initializes structured JSON tracing (only for commands that actually run).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,chatcore_gateway=debug")))
        .json()
        .init();
}
