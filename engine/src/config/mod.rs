//! Configuration management
//!
//! This module handles loading, validation, and management of the Moustachar
//! configuration. Configuration is stored in TOML format at
//! ~/.moustachar/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level, conversation history window
//! - **llm**: Generation backend settings (OpenAI-compatible)
//! - **graph**: Legal knowledge-graph QA service endpoint
//! - **vector**: Semantic passage index endpoint
//! - **web_search**: External web search endpoint
//! - **retrieval**: Fan-out behavior (per-source timeout, query routing)
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory for the data directory, and creates it if missing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors produced while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure
///
/// Represents the complete Moustachar configuration loaded from
/// ~/.moustachar/config.toml. Every section has serde defaults, so a partial
/// file (or none at all) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Knowledge-graph QA source
    #[serde(default)]
    pub graph: GraphConfig,

    /// Semantic passage source
    #[serde(default)]
    pub vector: VectorConfig,

    /// Web search source
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Fan-out retrieval behavior
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path, holds the conversation database (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of prior turns loaded as conversational context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

/// Generation backend configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
}

/// Knowledge-graph QA service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URL of the graph QA service
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
}

/// Semantic passage index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Base URL of the similarity-search service
    #[serde(default = "default_vector_base_url")]
    pub base_url: String,

    /// Number of passages retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Web search configuration (Tavily-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Base URL of the search API
    #[serde(default = "default_web_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_web_api_key_env")]
    pub api_key_env: String,

    /// Number of results retrieved per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// Fan-out retrieval behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Wall-clock budget per source call, in seconds. A source that exceeds
    /// it contributes an empty fragment instead of stalling the turn.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,

    /// Send the reformulated query (instead of the raw utterance) to the graph source
    #[serde(default)]
    pub graph_uses_reformulated: bool,

    /// Send the reformulated query (instead of the raw utterance) to the semantic source
    #[serde(default)]
    pub semantic_uses_reformulated: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.moustachar")
}

fn default_history_limit() -> usize {
    12
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_graph_base_url() -> String {
    "http://127.0.0.1:7474".to_string()
}

fn default_vector_base_url() -> String {
    "http://127.0.0.1:6333".to_string()
}

fn default_top_k() -> usize {
    4
}

fn default_web_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_web_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_source_timeout() -> u64 {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            request_timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_vector_base_url(),
            top_k: default_top_k(),
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_web_base_url(),
            api_key_env: default_web_api_key_env(),
            max_results: default_max_results(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout(),
            graph_uses_reformulated: false,
            semantic_uses_reformulated: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            graph: GraphConfig::default(),
            vector: VectorConfig::default(),
            web_search: WebSearchConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.moustachar/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// and writes it there. Validates the configuration after loading.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save it to `path`
    fn create_default(path: &Path) -> Result<Self, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Invalid(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ConfigError::Invalid(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.moustachar/config.toml)
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Invalid("Could not determine home directory".to_string()))?;

        Ok(home.join(".moustachar").join("config.toml"))
    }

    /// Path of the conversation database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("conversations.db")
    }

    /// Validate fields and expand the data directory path
    fn validate_and_process(&mut self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.core.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }

        if self.vector.top_k == 0 || self.vector.top_k > 20 {
            return Err(ConfigError::Invalid(
                "vector.top_k must be between 1 and 20".to_string(),
            ));
        }

        if self.web_search.max_results == 0 || self.web_search.max_results > 10 {
            return Err(ConfigError::Invalid(
                "web_search.max_results must be between 1 and 10".to_string(),
            ));
        }

        if self.retrieval.source_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.source_timeout_secs must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_tilde(&self.core.data_dir)?;

        Ok(())
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_tilde(path: &Path) -> Result<PathBuf, ConfigError> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/").or_else(|| s.strip_prefix("~")) {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Invalid("Could not determine home directory".to_string()))?;
        Ok(home.join(rest.trim_start_matches('/')))
    } else {
        Ok(path.to_path_buf())
    }
}
