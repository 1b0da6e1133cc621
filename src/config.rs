//! Configuration management for sql-gate.
//!
//! Handles loading configuration from TOML files and environment variables.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable overriding the service base URL.
pub const URL_ENV: &str = "SQL_GATE_URL";

/// Environment variable carrying the service bearer token.
pub const TOKEN_ENV: &str = "SQL_GATE_TOKEN";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Remote execution service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Session behaviour settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Remote execution service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the API, e.g. `http://localhost:8000/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token (not recommended to store in config).
    #[serde(default)]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
        }
    }
}

impl ServiceConfig {
    /// Parses and validates the base URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| GateError::config(format!("Invalid service URL: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(GateError::config(format!(
                "Invalid scheme '{other}'. Expected 'http' or 'https'"
            ))),
        }
    }

    /// Applies `SQL_GATE_URL` / `SQL_GATE_TOKEN` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(URL_ENV) {
            self.base_url = url;
        }
        if self.token.is_none() {
            self.token = std::env::var(TOKEN_ENV).ok();
        }
    }
}

/// Session behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Row limit passed with every execution request.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Maximum number of history entries kept in memory.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Number of suggestions requested from the advisor.
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

fn default_row_limit() -> usize {
    200
}

fn default_history_limit() -> usize {
    50
}

fn default_max_suggestions() -> usize {
    3
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            history_limit: default_history_limit(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sql-gate")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            GateError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the session cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.service.url()?;
        if self.session.row_limit == 0 {
            return Err(GateError::config("session.row_limit must be at least 1"));
        }
        if self.session.history_limit == 0 {
            return Err(GateError::config(
                "session.history_limit must be at least 1",
            ));
        }
        Ok(())
    }
}
