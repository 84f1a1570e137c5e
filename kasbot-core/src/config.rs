//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/kasbot/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/kasbot/` (~/.config/kasbot/)
//! - Data: `$XDG_DATA_HOME/kasbot/` (~/.local/share/kasbot/)
//! - State/Logs: `$XDG_STATE_HOME/kasbot/` (~/.local/state/kasbot/)
//!
//! All heuristic constants the pipeline relies on (COGS ratios, the
//! fallback purchase category, the analytics window) live here as explicit,
//! documented defaults rather than magic values in the persistence path.

use crate::error::{Error, Result};
use crate::types::Category;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// LLM parsing/categorization service (optional; without it the
    /// fallback parser reports a typed failure)
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Capture pipeline tunables
    #[serde(default)]
    pub capture: CaptureConfig,

    /// CCC analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// Model to use
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Claude,
    OpenAI,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }
}

fn default_llm_timeout() -> u64 {
    30
}

/// Capture pipeline tunables
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Replies at or below this many tokens are always treated as
    /// clarification answers, even when they contain a transaction verb
    #[serde(default = "default_short_reply_max_tokens")]
    pub short_reply_max_tokens: usize,

    /// COGS estimate ratio applied to sale amounts at persistence time
    #[serde(default = "default_capture_cogs_ratio")]
    pub cogs_ratio: f64,

    /// Category used when best-effort categorization fails or is skipped
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
}

impl CaptureConfig {
    /// Parsed form of `fallback_category`; invalid values fall back to `other`.
    pub fn fallback_category(&self) -> Category {
        Category::from_str(&self.fallback_category).unwrap_or(Category::Other)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            short_reply_max_tokens: default_short_reply_max_tokens(),
            cogs_ratio: default_capture_cogs_ratio(),
            fallback_category: default_fallback_category(),
        }
    }
}

fn default_short_reply_max_tokens() -> usize {
    4
}

fn default_capture_cogs_ratio() -> f64 {
    0.6
}

fn default_fallback_category() -> String {
    "other".to_string()
}

/// CCC analytics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Lookback window for CCC computation, in days
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// COGS estimate ratio applied to total sales inside the window
    #[serde(default = "default_analytics_cogs_ratio")]
    pub cogs_ratio: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            cogs_ratio: default_analytics_cogs_ratio(),
        }
    }
}

fn default_window_days() -> i64 {
    90
}

fn default_analytics_cogs_ratio() -> f64 {
    0.7
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.capture.cogs_ratio <= 0.0 || self.capture.cogs_ratio >= 1.0 {
            return Err(Error::Config(
                "capture.cogs_ratio must be between 0 and 1 exclusive".to_string(),
            ));
        }
        if self.analytics.cogs_ratio <= 0.0 || self.analytics.cogs_ratio >= 1.0 {
            return Err(Error::Config(
                "analytics.cogs_ratio must be between 0 and 1 exclusive".to_string(),
            ));
        }
        if self.analytics.window_days <= 0 {
            return Err(Error::Config(
                "analytics.window_days must be positive".to_string(),
            ));
        }
        if Category::from_str(&self.capture.fallback_category).is_err() {
            return Err(Error::Config(format!(
                "capture.fallback_category is not a known category: {}",
                self.capture.fallback_category
            )));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/kasbot/config.toml` (~/.config/kasbot/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("kasbot").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite store)
    ///
    /// `$XDG_DATA_HOME/kasbot/` (~/.local/share/kasbot/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("kasbot")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/kasbot/` (~/.local/state/kasbot/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("kasbot")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/kasbot/data.db` (~/.local/share/kasbot/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/kasbot/kasbot.log` (~/.local/state/kasbot/kasbot.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("kasbot.log")
    }
}
