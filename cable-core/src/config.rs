// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file used when CABLE_CONFIG_PATH is not set
pub const DEFAULT_CONFIG_FILE: &str = "cable.toml";

/// Socket Mode only accepts app-level tokens
const SLACK_APP_TOKEN_PREFIX: &str = "xapp-";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

// ─── ServerConfig ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

// ─── SlackConfig ────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...) for Web API calls
    #[serde(default)]
    pub bot_token: String,
    /// App-level token (xapp-...) for Socket Mode
    #[serde(default)]
    pub app_token: String,
    /// Channel messages are read from and relayed to
    #[serde(default)]
    pub relayed_channel: String,
    /// Id the relay posts as; its own messages are never relayed back.
    /// Empty means "whatever auth.test reports".
    #[serde(default)]
    pub bot_user_id: String,
}

// Custom Debug impl to redact tokens
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("app_token", &"[REDACTED]")
            .field("relayed_channel", &self.relayed_channel)
            .field("bot_user_id", &self.bot_user_id)
            .finish()
    }
}

// ─── TelegramConfig ─────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Group chat messages are read from and relayed to
    #[serde(default)]
    pub relayed_chat: i64,
    /// Bot's numeric user id. Zero means "whatever getMe reports".
    #[serde(default)]
    pub bot_user_id: u64,
}

// Custom Debug impl to redact bot_token
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("relayed_chat", &self.relayed_chat)
            .field("bot_user_id", &self.bot_user_id)
            .finish()
    }
}

// ─── Loading ────────────────────────────────────────────────────

impl Config {
    /// Path of the config file: CABLE_CONFIG_PATH, or cable.toml in the working directory
    pub fn config_path() -> PathBuf {
        std::env::var("CABLE_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from the default path with environment variable overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path` (if it exists) with environment variable overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PORT") {
            self.server.port = parse_port(&val)?;
        }
        if let Ok(val) = std::env::var("BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Ok(val) = std::env::var("SLACK_TOKEN") {
            self.slack.bot_token = val;
        }
        if let Ok(val) = std::env::var("SLACK_APP_TOKEN") {
            self.slack.app_token = val;
        }
        if let Ok(val) = std::env::var("SLACK_RELAYED_CHANNEL") {
            self.slack.relayed_channel = val;
        }
        if let Ok(val) = std::env::var("SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = val;
        }
        if let Ok(val) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram.bot_token = val;
        }
        if let Ok(val) = std::env::var("TELEGRAM_RELAYED_CHANNEL") {
            self.telegram.relayed_chat = val.trim().parse().with_context(|| {
                format!("TELEGRAM_RELAYED_CHANNEL must be an integer, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("TELEGRAM_BOT_USER_ID") {
            self.telegram.bot_user_id = val.trim().parse().with_context(|| {
                format!("TELEGRAM_BOT_USER_ID must be a positive integer, got: {}", val)
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.slack.bot_token.trim().is_empty() {
            anyhow::bail!("slack.bot_token is required (set in config file or SLACK_TOKEN env var)");
        }
        if self.slack.app_token.trim().is_empty() {
            anyhow::bail!(
                "slack.app_token is required (set in config file or SLACK_APP_TOKEN env var)"
            );
        }
        if !self.slack.app_token.trim().starts_with(SLACK_APP_TOKEN_PREFIX) {
            anyhow::bail!(
                "slack.app_token must be an app-level token starting with {}",
                SLACK_APP_TOKEN_PREFIX
            );
        }
        if self.slack.relayed_channel.trim().is_empty() {
            anyhow::bail!(
                "slack.relayed_channel is required (set in config file or SLACK_RELAYED_CHANNEL env var)"
            );
        }
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "telegram.bot_token is required (set in config file or TELEGRAM_TOKEN env var)"
            );
        }
        if self.telegram.relayed_chat == 0 {
            anyhow::bail!(
                "telegram.relayed_chat is required (set in config file or TELEGRAM_RELAYED_CHANNEL env var)"
            );
        }
        Ok(())
    }

    /// Address the health server binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

/// Parse a listening port given either as `8080` or `:8080`
pub fn parse_port(val: &str) -> Result<u16> {
    let trimmed = val.trim();
    trimmed
        .strip_prefix(':')
        .unwrap_or(trimmed)
        .parse()
        .with_context(|| format!("PORT must be a valid port number, got: {}", val))
}
