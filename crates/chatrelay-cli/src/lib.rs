use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use chatrelay_context::ContextManager;
use chatrelay_irc::IrcClient;
use chatrelay_runtime::{AnthropicProvider, CompletionProvider};
use clap::Parser;
use tracing::info;

pub mod config;
pub mod relay;

pub use config::{Config, ConfigError};
pub use relay::Relay;

pub fn crate_name() -> &'static str {
    "chatrelay"
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "chatrelay",
    version,
    about = "IRC relay for a language model",
    long_about = "Joins IRC channels and answers messages addressed to the bot's nick with replies from the Anthropic Messages API"
)]
pub struct Cli {
    #[arg(short = 'c', long = "config", help = "Path to the JSON configuration file")]
    pub config: PathBuf,
}

/// Loads the configuration, connects and relays until the server disconnects.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;

    let provider: Arc<dyn CompletionProvider> = Arc::new(
        AnthropicProvider::new(
            config.anthropic_api_key.clone(),
            config.anthropic_api_base.clone(),
            config.anthropic_model.clone(),
        )
        .context("failed to build completion provider")?,
    );
    let manager = Arc::new(ContextManager::new(
        config.context.clone(),
        provider,
        config.system_prompt.clone(),
    ));

    let session = IrcClient::new(config.irc())
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}:{}", config.irc_server, config.irc_port))?;

    let relay = Relay::new(
        manager,
        session.sender.clone(),
        config.irc_nick.clone(),
        config.nickserv_password().map(str::to_string),
        config.irc_channels.clone(),
    );
    relay.run(session.events).await?;
    session.task.await??;

    info!("relay stopped");
    Ok(())
}
