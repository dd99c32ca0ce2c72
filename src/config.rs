//! Configuration loading and management
//!
//! Handles parsing of `.tskdash.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::projection::Tab;

pub const CONFIG_FILE_NAME: &str = ".tskdash.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Feed endpoints and timings
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Dashboard display defaults
    #[serde(default)]
    pub ui: UiConfig,
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Base URL of the job system's dashboard API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the event stream
    #[serde(default = "default_sse_path")]
    pub sse_path: String,

    /// Path of the history listing
    #[serde(default = "default_history_path")]
    pub history_path: String,

    /// History poll interval (e.g. "2s", "500ms")
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Delay before reconnecting a closed stream, unless the server sends `retry`
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,

    /// Buffered feed events between the feeds and the dashboard
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_sse_path() -> String {
    "/sse".to_string()
}

fn default_history_path() -> String {
    "/api/history".to_string()
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_reconnect_delay() -> String {
    "3s".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sse_path: default_sse_path(),
            history_path: default_history_path(),
            poll_interval: default_poll_interval(),
            reconnect_delay: default_reconnect_delay(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl FeedsConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration(&self.poll_interval)
    }

    pub fn reconnect_delay(&self) -> Result<Duration> {
        parse_duration(&self.reconnect_delay)
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        let url = reqwest::Url::parse(base).map_err(|err| {
            Error::InvalidConfig(format!("feeds.base_url: invalid url '{base}': {err}"))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::InvalidConfig(format!(
                "feeds.base_url: unsupported scheme '{}' (expected http|https)",
                url.scheme()
            )));
        }

        validate_path(&self.sse_path, "feeds.sse_path")?;
        validate_path(&self.history_path, "feeds.history_path")?;

        if self.poll_interval()?.is_zero() {
            return Err(Error::InvalidConfig(
                "feeds.poll_interval must be > 0".to_string(),
            ));
        }
        if self.reconnect_delay()?.is_zero() {
            return Err(Error::InvalidConfig(
                "feeds.reconnect_delay must be > 0".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "feeds.channel_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dashboard display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Tab shown on start: "all" or a task status
    #[serde(default = "default_tab")]
    pub default_tab: String,
}

fn default_tab() -> String {
    "all".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_tab: default_tab(),
        }
    }
}

impl UiConfig {
    pub fn tab(&self) -> Result<Tab> {
        Tab::parse(&self.default_tab).map_err(|_| {
            Error::InvalidConfig(format!(
                "ui.default_tab: unknown tab '{}'",
                self.default_tab
            ))
        })
    }
}

fn validate_path(path: &str, field: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(Error::InvalidConfig(format!(
            "{field}: path must start with '/' (got '{path}')"
        )));
    }
    Ok(())
}

/// Parse "500ms", "2s", "1m", "1h". A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidConfig("duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, "s"),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid duration number in '{s}'")))?;

    let duration = match unit.to_ascii_lowercase().as_str() {
        "ms" => Some(Duration::from_millis(num)),
        "s" | "sec" | "secs" | "second" | "seconds" => Some(Duration::from_secs(num)),
        "m" | "min" | "mins" | "minute" | "minutes" => num.checked_mul(60).map(Duration::from_secs),
        "h" | "hr" | "hour" | "hours" => num.checked_mul(3600).map(Duration::from_secs),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "invalid duration unit '{unit}'. Expected: ms, s, m, h"
            )));
        }
    };
    duration.ok_or_else(|| Error::InvalidConfig(format!("duration '{s}' is too large")))
}

impl Config {
    /// Load configuration from a `.tskdash.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults.
    ///
    /// An unreadable or invalid file is logged and ignored.
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Resolve configuration for a run.
    ///
    /// An explicit path must exist and be valid. Otherwise the working
    /// directory is checked, then the user config directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            return Self::load(path);
        }

        let cwd = std::env::current_dir()?;
        if cwd.join(CONFIG_FILE_NAME).exists() {
            return Ok(Self::load_from_dir(&cwd));
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Ok(match Self::load(&path) {
                    Ok(config) => config,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "ignoring invalid config");
                        Self::default()
                    }
                });
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.feeds.validate()?;
        self.ui.tab()?;
        Ok(())
    }
}

/// `<user config dir>/tskdash/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tskdash")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
