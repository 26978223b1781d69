// Session configuration loaded from TOML

use crate::RenderOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub poll: PollConfig,
}

/// Where the row, recipe and chat endpoints live
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_rows_path")]
    pub rows_path: String,
    #[serde(default = "default_recipes_path")]
    pub recipes_path: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://127.0.0.1:8000".to_string() }
fn default_rows_path() -> String { "/api/rows".to_string() }
fn default_recipes_path() -> String { "/api/dashboard".to_string() }
fn default_chat_path() -> String { "/api/chat".to_string() }
fn default_timeout_secs() -> u64 { 60 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            rows_path: default_rows_path(),
            recipes_path: default_recipes_path(),
            chat_path: default_chat_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Join the base URL and an endpoint path without doubling the slash
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Recipe poll loop timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,
    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,
    /// Give up after this many polls; unbounded when absent
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_ready_delay_ms() -> u64 { 2000 }
fn default_error_delay_ms() -> u64 { 3000 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            ready_delay_ms: default_ready_delay_ms(),
            error_delay_ms: default_error_delay_ms(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
