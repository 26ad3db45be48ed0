//! Configuration management for Chatline
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! The completion API key is deliberately not part of [`Config`]: it is
//! resolved at runtime by [`resolve_api_key`] from the environment or the OS
//! keyring and never written to disk.

use crate::error::{ChatlineError, Result};
use crate::storage::DEFAULT_INDEX_KEY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the completion API key
pub const API_KEY_ENV: &str = "CHATLINE_API_KEY";

/// Keyring service name for the stored completion API key
pub const KEYRING_SERVICE: &str = "chatline";

/// Keyring user name for the stored completion API key
pub const KEYRING_USER: &str = "completion-api-key";

/// Main configuration structure for Chatline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote completion endpoint settings
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Conversation persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP server settings (scrape endpoint and completion proxy)
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Full URL of the chat-completions endpoint (or of a `chatline serve`
    /// proxy's `/api/chat` route)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum number of tokens in a reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "https://api-inference.huggingface.co/models/microsoft/Phi-3-mini-4k-instruct/v1/chat/completions"
        .to_string()
}

fn default_model() -> String {
    "microsoft/Phi-3-mini-4k-instruct".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Conversation persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory; `None` uses the platform data directory
    #[serde(default)]
    pub path: Option<String>,

    /// Key under which the conversation index is stored
    #[serde(default = "default_index_key")]
    pub index_key: String,
}

fn default_index_key() -> String {
    DEFAULT_INDEX_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            index_key: default_index_key(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Timeout for fetching a page to scrape (seconds)
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_seconds: u64,

    /// Maximum number of bytes read from a scraped page
    #[serde(default = "default_scrape_max_bytes")]
    pub scrape_max_bytes: usize,

    /// Maximum scrape requests accepted per minute
    #[serde(default = "default_scrape_rpm")]
    pub scrape_requests_per_minute: u32,

    /// Allow scraping loopback and private network addresses
    #[serde(default)]
    pub allow_private_ips: bool,
}

fn default_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_scrape_timeout() -> u64 {
    30
}

fn default_scrape_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_scrape_rpm() -> u32 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            scrape_timeout_seconds: default_scrape_timeout(),
            scrape_max_bytes: default_scrape_max_bytes(),
            scrape_requests_per_minute: default_scrape_rpm(),
            allow_private_ips: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatlineError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatlineError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("CHATLINE_ENDPOINT") {
            self.completion.endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("CHATLINE_MODEL") {
            self.completion.model = model;
        }

        if let Ok(max_tokens) = std::env::var("CHATLINE_MAX_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.completion.max_tokens = value;
            } else {
                tracing::warn!("Invalid CHATLINE_MAX_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(timeout) = std::env::var("CHATLINE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.completion.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATLINE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(path) = std::env::var("CHATLINE_STORAGE_PATH") {
            self.storage.path = Some(path);
        }

        if let Ok(addr) = std::env::var("CHATLINE_SERVER_ADDR") {
            self.server.addr = addr;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }

        if let crate::cli::Commands::Serve {
            addr: Some(addr), ..
        } = &cli.command
        {
            self.server.addr = addr.clone();
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.completion.endpoint.trim().is_empty() {
            return Err(
                ChatlineError::Config("completion.endpoint cannot be empty".to_string()).into(),
            );
        }

        match url::Url::parse(&self.completion.endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(ChatlineError::Config(format!(
                    "completion.endpoint must use http or https, got {}",
                    url.scheme()
                ))
                .into());
            }
            Err(e) => {
                return Err(ChatlineError::Config(format!(
                    "completion.endpoint is not a valid URL: {}",
                    e
                ))
                .into());
            }
        }

        if self.completion.model.trim().is_empty() {
            return Err(
                ChatlineError::Config("completion.model cannot be empty".to_string()).into(),
            );
        }

        if self.completion.max_tokens == 0 {
            return Err(ChatlineError::Config(
                "completion.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if self.completion.timeout_seconds == 0 {
            return Err(ChatlineError::Config(
                "completion.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.index_key.trim().is_empty() {
            return Err(
                ChatlineError::Config("storage.index_key cannot be empty".to_string()).into(),
            );
        }

        if self.server.scrape_timeout_seconds == 0 {
            return Err(ChatlineError::Config(
                "server.scrape_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.scrape_max_bytes == 0 {
            return Err(ChatlineError::Config(
                "server.scrape_max_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.scrape_requests_per_minute == 0 {
            return Err(ChatlineError::Config(
                "server.scrape_requests_per_minute must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

/// Resolve the completion API key
///
/// Looks at `CHATLINE_API_KEY` first, then the OS keyring entry written by
/// `chatline auth`. Returns `None` when neither holds a non-empty key, which
/// is the expected setup for a client talking to a `chatline serve` proxy.
pub fn resolve_api_key() -> Option<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }

    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|e| e.get_password()) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        Ok(_) => None,
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            tracing::debug!("Keyring lookup failed: {}", e);
            None
        }
    }
}

/// Store the completion API key in the OS keyring
///
/// # Errors
///
/// Returns `ChatlineError::Keyring` if the keyring is unavailable
pub fn store_api_key(key: &str) -> Result<()> {
    let entry =
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(ChatlineError::Keyring)?;
    entry.set_password(key).map_err(ChatlineError::Keyring)?;
    Ok(())
}
