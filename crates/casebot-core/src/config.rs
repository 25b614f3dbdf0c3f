use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::warn;

use crate::render::highlight::DEFAULT_THEME;
use crate::state::Message;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5002/query";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_GREETING: &str = "I'm the court precedent assistant. Describe your situation or ask about a case. 😄";

pub const ENDPOINT_ENV: &str = "CASEBOT_ENDPOINT";
pub const TIMEOUT_ENV: &str = "CASEBOT_TIMEOUT_SECS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub greeting: Option<String>,
    pub highlight_theme: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            request_timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            greeting: None,
            highlight_theme: None,
        }
    }

    /// Load from the user config directory, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply `CASEBOT_*` environment overrides on top of the file values
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoint = Some(endpoint.trim().to_string());
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = Some(secs),
                _ => warn!(value = %raw, "ignoring invalid {}", TIMEOUT_ENV),
            }
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn highlight_theme(&self) -> &str {
        self.highlight_theme.as_deref().unwrap_or(DEFAULT_THEME)
    }

    /// The assistant greeting every conversation starts with
    pub fn seed_message(&self) -> Message {
        Message::assistant(self.greeting.as_deref().unwrap_or(DEFAULT_GREETING))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("casebot").join("config.json"))
    }
}
