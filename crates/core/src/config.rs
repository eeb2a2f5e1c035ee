//! Persisted client configuration.
//!
//! The config is a small JSON document at `<config dir>/ai-cli/config.json`:
//!
//! ```json
//! {
//!   "api_key": "sk-or-...",
//!   "model": "x-ai/grok-4.1-fast:free"
//! }
//! ```
//!
//! Keys this crate does not know about are carried through load and save
//! untouched.
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::assets::get_config_dir;

/// Model used when neither the command line nor the config names one.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast:free";

/// OpenRouter's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Environment variable consulted when the config holds no API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Returns `path` or the default config file location.
pub fn config_file_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| get_config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Loads the config. A missing or blank file yields the empty config.
    #[instrument(skip(path))]
    pub fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
        let config_file = config_file_path(path);
        if !config_file.exists() {
            debug!("No config at {}, using defaults", config_file.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_file)?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the config as pretty JSON, creating parent directories.
    #[instrument(skip(self, path))]
    pub fn save(&self, path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let config_file = config_file_path(path);
        ensure_parent_dir(&config_file)?;

        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(&config_file, content)?;
        debug!("Saved config to {}", config_file.display());
        Ok(config_file)
    }

    /// Stores `api_key` in the config file, keeping every other entry.
    pub fn set_api_key(api_key: &str, path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let mut config = Config::load(path.clone())?;
        config.api_key = Some(api_key.trim().to_string());
        config.save(path)
    }

    /// Config key first, then the `OPENROUTER_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        pick_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
    }

    /// Command line override, then config, then [`DEFAULT_MODEL`].
    pub fn resolve_model(&self, cli_override: Option<&str>) -> String {
        let not_blank = |m: &&str| !m.trim().is_empty();
        cli_override
            .filter(not_blank)
            .or(self.model.as_deref().filter(not_blank))
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }
}

fn pick_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            from_env
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        })
}

fn ensure_parent_dir(file: &Path) -> Result<(), ConfigError> {
    let parent_dir = file.parent().ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Config path has no parent directory",
        ))
    })?;

    if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
        fs::create_dir_all(parent_dir)?;
    }
    Ok(())
}
