//! Configuration management
//!
//! This module handles loading, validation, and management of the Haven configuration.
//! Configuration is stored in TOML format at ~/.haven/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **limits**: Per-message, per-session, and per-day quotas
//! - **storage**: Which key-value backend holds the usage ledger
//! - **reasoning**: Optional external reasoning service and its polling policy
//!
//! # Path Expansion
//!
//! `~` in the data directory is expanded to the user's home directory and the
//! directory is created if it doesn't exist.
//!
//! # Examples
//!
//! ```no_run
//! use haven_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Messages per chat: {}", config.limits.max_messages);
//! # Ok(())
//! # }
//! ```

use sdk::errors::AdvisorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Conversation quotas
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Persistence backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// External reasoning service (optional)
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Quotas enforced on conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum characters kept from a single user message
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Maximum messages in one session, greeting included
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Maximum sessions that may be started per local calendar day
    #[serde(default = "default_max_chats_per_day")]
    pub max_chats_per_day: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_messages: default_max_messages(),
            max_chats_per_day: default_max_chats_per_day(),
        }
    }
}

/// Key-value backend used by the usage ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite file under the data directory
    #[default]
    Sqlite,

    /// Process memory only; usage is forgotten on exit
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// External reasoning service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Use the external service; when false every reply comes from the oracle
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the reasoning service
    #[serde(default = "default_reasoning_base_url")]
    pub base_url: String,

    /// Timeout applied to each individual HTTP request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between job status polls (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Number of status polls before the job is abandoned
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl ReasoningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_reasoning_base_url(),
            request_timeout_secs: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.haven")
}

fn default_max_chars() -> usize {
    500
}

fn default_max_messages() -> usize {
    20
}

fn default_max_chats_per_day() -> u32 {
    10
}

fn default_reasoning_base_url() -> String {
    "http://localhost:8787".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            limits: LimitsConfig::default(),
            storage: StorageConfig::default(),
            reasoning: ReasoningConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.haven/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, AdvisorError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, AdvisorError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| AdvisorError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, AdvisorError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| AdvisorError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, AdvisorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AdvisorError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();

        // Serialize before processing so the file keeps the portable ~ path
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| AdvisorError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| AdvisorError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.haven/config.toml)
    fn default_config_path() -> Result<PathBuf, AdvisorError> {
        let home = dirs::home_dir().ok_or_else(|| {
            AdvisorError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".haven").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and quotas
    /// - Validates the reasoning polling policy
    /// - Expands ~ in the data directory and creates it
    fn validate_and_process(&mut self) -> Result<(), AdvisorError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if self.storage.backend == StorageBackend::Sqlite && !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                AdvisorError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }

    /// Check value ranges without touching the file system
    pub fn validate(&self) -> Result<(), AdvisorError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(AdvisorError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.limits.max_chars == 0 {
            return Err(AdvisorError::Config(
                "max_chars must be at least 1".to_string(),
            ));
        }

        // Greeting plus one full exchange
        if self.limits.max_messages < 3 {
            return Err(AdvisorError::Config(
                "max_messages must be at least 3".to_string(),
            ));
        }

        if self.limits.max_chats_per_day == 0 {
            return Err(AdvisorError::Config(
                "max_chats_per_day must be at least 1".to_string(),
            ));
        }

        if self.reasoning.enabled {
            if self.reasoning.base_url.trim().is_empty() {
                return Err(AdvisorError::Config(
                    "reasoning.base_url must be set when reasoning is enabled".to_string(),
                ));
            }
            if self.reasoning.max_poll_attempts == 0 {
                return Err(AdvisorError::Config(
                    "reasoning.max_poll_attempts must be at least 1".to_string(),
                ));
            }
            if self.reasoning.request_timeout_secs == 0 {
                return Err(AdvisorError::Config(
                    "reasoning.request_timeout_secs must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Path of the SQLite database under the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("haven.db")
    }
}

/// Expand ~ in path to user's home directory
///
/// # Examples
///
/// ```ignore
/// let path = PathBuf::from("~/.haven");
/// let expanded = expand_path(&path)?;
/// // expanded is now /home/user/.haven (on Unix)
/// ```
fn expand_path(path: &Path) -> Result<PathBuf, AdvisorError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| AdvisorError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            AdvisorError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| AdvisorError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
