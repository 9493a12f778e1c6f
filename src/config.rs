use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use std::path::{Path, PathBuf};

use crate::migration::pacer::RetryPolicy;
use crate::migration::{DeliveryLimits, MigrationSettings};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Empty means "read BOT_TOKEN from the environment".
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: f64,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    #[serde(default = "default_max_caption_length")]
    pub max_caption_length: usize,
    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,
    #[serde(default = "default_max_throttle_retries")]
    pub max_throttle_retries: u32,
    /// Number of per-message errors listed in the chat summary.
    #[serde(default = "default_error_preview")]
    pub error_preview: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            messages_per_second: default_messages_per_second(),
            progress_interval: default_progress_interval(),
            max_text_length: default_max_text_length(),
            max_caption_length: default_max_caption_length(),
            ellipsis: default_ellipsis(),
            max_throttle_retries: default_max_throttle_retries(),
            error_preview: default_error_preview(),
        }
    }
}

impl MigrationConfig {
    pub fn settings(&self) -> MigrationSettings {
        MigrationSettings {
            messages_per_second: self.messages_per_second,
            progress_interval: self.progress_interval,
            limits: DeliveryLimits {
                max_text_len: self.max_text_length,
                max_caption_len: self.max_caption_length,
                ellipsis: self.ellipsis.clone(),
            },
            retry: RetryPolicy {
                max_throttle_retries: self.max_throttle_retries,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub listen: SocketAddr,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bot_database.db")
}

fn default_messages_per_second() -> f64 {
    20.0
}

fn default_progress_interval() -> usize {
    100
}

fn default_max_text_length() -> usize {
    4096
}

fn default_max_caption_length() -> usize {
    1024
}

fn default_ellipsis() -> String {
    "...".to_string()
}

fn default_max_throttle_retries() -> u32 {
    1
}

fn default_error_preview() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.telegram.admin_user_ids.contains(&user_id)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;

        if config.telegram.bot_token.is_empty() {
            config.telegram.bot_token = std::env::var("BOT_TOKEN").unwrap_or_default();
        }
        if config.telegram.bot_token.is_empty() {
            bail!("BOT_TOKEN not set in [telegram] bot_token or the environment");
        }

        Ok(config)
    }

    /// Parse and validate without touching the environment.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        let m = &config.migration;
        if !(m.messages_per_second > 0.0) {
            bail!(
                "[migration] messages_per_second must be positive, got {}",
                m.messages_per_second
            );
        }
        if Duration::try_from_secs_f64(1.0 / m.messages_per_second).is_err() {
            bail!(
                "[migration] messages_per_second {} is too small to pace sends",
                m.messages_per_second
            );
        }
        let marker = m.ellipsis.chars().count();
        if marker > m.max_text_length || marker > m.max_caption_length {
            bail!("[migration] ellipsis is longer than the text or caption limit");
        }

        Ok(config)
    }
}
