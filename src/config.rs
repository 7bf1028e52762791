use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How outgoing replies produced by `Session::say` reach the platform.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Direct write of the message frame to the realtime transport
    Rtm,
    /// Form post through the Web API, supports attachments
    #[default]
    Web,
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Rtm => write!(f, "rtm"),
            Delivery::Web => write!(f, "web"),
        }
    }
}

/// What the engine does when the realtime connection fails at runtime.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Stop the engine and surface the error
    #[default]
    Exit,
    /// Re-run bootstrap and the transport handshake with backoff
    Reconnect,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_rtm_method")]
    pub rtm_method: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    #[serde(default)]
    pub delivery: Delivery,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            fallback_reply: default_fallback_reply(),
            delivery: Delivery::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            on_error: OnError::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl ConnectionConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_rtm_method() -> String {
    "rtm.start".to_string()
}

fn default_name() -> String {
    "rtmbot".to_string()
}

fn default_fallback_reply() -> String {
    "uhhhmmm...".to_string()
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid TOML configuration")?;

        if config.slack.token.trim().is_empty() {
            anyhow::bail!("slack.token must not be empty");
        }

        if !matches!(config.slack.rtm_method.as_str(), "rtm.start" | "rtm.connect") {
            anyhow::bail!(
                "slack.rtm_method must be \"rtm.start\" or \"rtm.connect\", got \"{}\"",
                config.slack.rtm_method
            );
        }

        Ok(config)
    }
}
