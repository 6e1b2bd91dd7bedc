use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Upper bound for a single store read/write before it is reported
    /// to the caller as timed out.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Ruleset the engine toggles and counts matches for.
    #[serde(default = "default_ruleset_id")]
    pub ruleset_id: String,
    #[serde(default = "default_sync_attempts")]
    pub sync_attempts: u32,
    #[serde(default = "default_sync_retry_delay_ms")]
    pub sync_retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8053
}
fn default_storage_path() -> String {
    "ad-warden.db".to_string()
}
fn default_op_timeout_ms() -> u64 {
    2000
}
fn default_ruleset_id() -> String {
    "ad_rules".to_string()
}
fn default_sync_attempts() -> u32 {
    3
}
fn default_sync_retry_delay_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ruleset_id: default_ruleset_id(),
            sync_attempts: default_sync_attempts(),
            sync_retry_delay_ms: default_sync_retry_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}
