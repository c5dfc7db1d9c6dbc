//! Configuration loading and management for precis.
//!
//! Loads settings from `precis.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so a missing config file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::summarizer::{SummaryStyle, DEFAULT_MAX_CHARS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Model identifier (e.g., "gemini-2.5-flash")
    pub model: String,
    /// API root, overridable for proxies and tests
    pub base_url: String,
    pub temperature: f64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

/// Prompt settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Style used when none is given on the command line
    pub default_style: String,
    /// Maximum number of characters of page text sent to the model
    pub max_chars: usize,
}

/// Extractor messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long to wait for the extractor to answer a request
    pub timeout_secs: u64,
}

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base path for data storage
    pub path: PathBuf,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub summary: SummaryConfig,
    pub bridge: BridgeConfig,
    pub fetch: FetchConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default location (precis.toml in cwd or home)
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text and apply environment overrides
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.api.gemini_key = Some(key);
            }
        }
        self
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from("precis.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("precis")
            .join("precis.toml");
        home_config.exists().then_some(home_config)
    }

    /// The style to use when the caller did not pick one
    pub fn default_style(&self) -> SummaryStyle {
        match self.summary.default_style.trim() {
            "" => SummaryStyle::Concise,
            name => SummaryStyle::from_name(name),
        }
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.2,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            default_style: "concise".to_string(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|dir| dir.join("precis"))
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self { path }
    }
}
