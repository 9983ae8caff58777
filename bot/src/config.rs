//! Configuration management for the TGS bot.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,

    /// Discord guild ID for registering slash commands
    pub guild_id: Option<u64>,

    /// Extra bot owners on top of the application owner
    pub owner_ids: Vec<u64>,

    /// JSON file holding the TGS deployment settings
    pub settings_path: PathBuf,

    /// Transport timeout for requests to TGS
    pub http_timeout: Duration,

    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let discord_token = env::var("DISCORD_TOKEN")
            .context("DISCORD_TOKEN environment variable not set")?;

        let guild_id = env::var("DISCORD_GUILD_ID")
            .ok()
            .and_then(|s| s.parse().ok());

        let owner_ids = env::var("DISCORD_OWNER_IDS")
            .map(|s| parse_ids(&s))
            .unwrap_or_else(|_| Ok(Vec::new()))?;

        let settings_path = env::var("TGS_SETTINGS_PATH")
            .unwrap_or_else(|_| "tgs4-settings.json".to_string())
            .into();

        let http_timeout = match env::var("TGS_HTTP_TIMEOUT_SECS") {
            Ok(s) => s
                .parse()
                .map(Duration::from_secs)
                .with_context(|| format!("TGS_HTTP_TIMEOUT_SECS is not a number: {}", s))?,
            Err(_) => Duration::from_secs(30),
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            discord_token,
            guild_id,
            owner_ids,
            settings_path,
            http_timeout,
            log_level,
        })
    }
}

/// Parse a comma-separated list of Discord ids.
fn parse_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("DISCORD_OWNER_IDS contains an invalid id: {}", s))
        })
        .collect()
}
