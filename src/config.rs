//! Configuration management for campushub
//!
//! This module handles loading, parsing, and validating configuration
//! from YAML files and environment variable overrides.

use crate::error::{CampushubError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure for campushub
///
/// Holds everything both subcommands need: the hub server settings,
/// the completion provider, the student directory service, and the
/// command line used to launch the directory MCP server child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chat hub server configuration
    #[serde(default)]
    pub hub: HubConfig,

    /// Provider configuration (Ollama)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Student directory service configuration
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// How the hub launches the directory MCP server
    #[serde(default)]
    pub mcp: McpLaunchConfig,
}

/// Chat hub server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Address the websocket server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// System prompt prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum number of tool-invocation rounds per chat message
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_max_tool_rounds() -> usize {
    8
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            system_prompt: default_system_prompt(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// Provider configuration
///
/// Specifies which completion provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider_type() -> String {
    "ollama".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Student directory service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the upstream student API; records are fetched from
    /// `<api_url>/students`
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// How long a fetched student list stays fresh (seconds)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Directory where the server writes its rolling log file
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_api_url() -> String {
    "http://localhost:5095".to_string()
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            cache_ttl_seconds: default_cache_ttl(),
            log_dir: default_log_dir(),
        }
    }
}

/// How the hub launches the directory MCP server child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpLaunchConfig {
    /// Command to execute
    #[serde(default = "default_mcp_command")]
    pub command: String,

    /// Arguments passed to the command
    #[serde(default = "default_mcp_args")]
    pub args: Vec<String>,

    /// Extra environment variables for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_mcp_command() -> String {
    "campushub".to_string()
}

fn default_mcp_args() -> Vec<String> {
    vec!["directory".to_string()]
}

impl Default for McpLaunchConfig {
    fn default() -> Self {
        Self {
            command: default_mcp_command(),
            args: default_mcp_args(),
            env: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CampushubError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CampushubError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_url) = std::env::var("CAMPUSHUB_DIRECTORY_API_URL") {
            self.directory.api_url = api_url;
        }

        if let Ok(ollama_host) = std::env::var("CAMPUSHUB_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("CAMPUSHUB_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(CampushubError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(CampushubError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.hub.listen_addr.is_empty() {
            return Err(
                CampushubError::Config("hub.listen_addr cannot be empty".to_string()).into(),
            );
        }

        if self.hub.max_tool_rounds == 0 {
            return Err(CampushubError::Config(
                "hub.max_tool_rounds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.hub.max_tool_rounds > 100 {
            return Err(CampushubError::Config(
                "hub.max_tool_rounds must be less than or equal to 100".to_string(),
            )
            .into());
        }

        if self.directory.api_url.is_empty() {
            return Err(
                CampushubError::Config("directory.api_url cannot be empty".to_string()).into(),
            );
        }

        if self.directory.cache_ttl_seconds == 0 {
            return Err(CampushubError::Config(
                "directory.cache_ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.mcp.command.is_empty() {
            return Err(CampushubError::Config("mcp.command cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            provider: ProviderConfig::default(),
            directory: DirectoryConfig::default(),
            mcp: McpLaunchConfig::default(),
        }
    }
}
