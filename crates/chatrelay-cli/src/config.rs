//! JSON configuration file

use std::path::Path;

use chatrelay_context::ContextWindow;
use chatrelay_irc::IrcConfig;
use chatrelay_runtime::providers::anthropic::{ANTHROPIC_API_BASE, DEFAULT_MODEL};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing required config value `{0}`")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub irc_server: String,
    #[serde(default = "default_irc_port")]
    pub irc_port: u16,
    #[serde(default)]
    pub irc_nick: String,
    /// NickServ password; empty means join without identifying.
    #[serde(default)]
    pub irc_password: String,
    /// Connection password sent as `PASS`, for bouncers and private servers.
    #[serde(default)]
    pub irc_server_password: Option<String>,
    #[serde(default)]
    pub irc_channels: Vec<String>,
    #[serde(default = "default_true")]
    pub irc_tls: bool,
    #[serde(default = "default_model")]
    pub anthropic_model: String,
    #[serde(default = "default_api_base")]
    pub anthropic_api_base: String,
    #[serde(default)]
    pub context: ContextWindow,
}

fn default_irc_port() -> u16 {
    6697
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> String {
    ANTHROPIC_API_BASE.to_string()
}

impl Config {
    /// Reads and validates the file at `path`. An empty API key falls back to
    /// `ANTHROPIC_API_KEY` from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw, std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn from_json(raw: &str, env_api_key: Option<String>) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(raw)?;
        if config.anthropic_api_key.trim().is_empty() {
            config.anthropic_api_key = env_api_key.unwrap_or_default();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.anthropic_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("anthropic_api_key"));
        }
        if self.irc_server.trim().is_empty() {
            return Err(ConfigError::Missing("irc_server"));
        }
        if self.irc_nick.trim().is_empty() {
            return Err(ConfigError::Missing("irc_nick"));
        }
        Ok(())
    }

    pub fn nickserv_password(&self) -> Option<&str> {
        Some(self.irc_password.as_str()).filter(|p| !p.is_empty())
    }

    pub fn irc(&self) -> IrcConfig {
        IrcConfig {
            server: self.irc_server.clone(),
            port: self.irc_port,
            nick: self.irc_nick.clone(),
            server_password: self
                .irc_server_password
                .clone()
                .filter(|p| !p.is_empty()),
            tls: self.irc_tls,
        }
    }
}
