//! fundtree Configuration Module
//!
//! Config is stored in `~/.config/fundtree/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`FUNDTREE_MULTI_SELECT`, `FUNDTREE_ROLLBACK`,
//!    `FUNDTREE_POLL_INTERVAL_MS`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FundError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FundtreeConfig {
    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Clicking toggles nodes in and out of the selection
    pub multi_select: bool,

    /// Restore the last saved tree when the server rejects a save
    pub rollback_on_remote_failure: bool,

    /// Lowest numeric id handed out to new lines and calculations
    pub first_template_id: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            multi_select: false,
            rollback_on_remote_failure: false,
            first_template_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    pub poll_interval_ms: u64,

    /// Stop polling once every tracked job has completed
    pub stop_when_settled: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            stop_when_settled: true,
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl FundtreeConfig {
    /// Returns `~/.config/fundtree/` on Unix, `%APPDATA%/fundtree/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fundtree")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path, then apply environment overrides
    pub fn load() -> Result<Self> {
        Ok(Self::load_from(&Self::config_path())?.with_env())
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FundError::Config {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| FundError::Config {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| FundError::Config {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| FundError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| FundError::Config {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FundError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Environment variables take precedence over file values
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(flag) = var("FUNDTREE_MULTI_SELECT").and_then(|v| parse_flag(&v)) {
            self.editor.multi_select = flag;
        }
        if let Some(flag) = var("FUNDTREE_ROLLBACK").and_then(|v| parse_flag(&v)) {
            self.editor.rollback_on_remote_failure = flag;
        }
        if let Some(ms) = var("FUNDTREE_POLL_INTERVAL_MS").and_then(|v| v.trim().parse().ok()) {
            self.jobs.poll_interval_ms = ms;
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
