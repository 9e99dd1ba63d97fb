//! Configuration loading, validation, and management for Concierge.
//!
//! Loads configuration from `~/.concierge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.concierge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Per-channel presentation settings
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Escalation notifier settings
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Remote record lookup service
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("memory", &self.memory)
            .field("agent", &self.agent)
            .field("channels", &self.channels)
            .field("escalation", &self.escalation)
            .field("lookup", &self.lookup)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for EscalationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationConfig")
            .field("webhook_url", &self.webhook_url)
            .field("shared_secret", &redact(&self.shared_secret))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "sqlite", "file" or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Storage path override (database file or JSONL directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Number of stored turns loaded into each prompt (at most 20)
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}
fn default_window() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            window: default_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Tool round-trips allowed per inbound message
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Upper bound on a tool-result summary re-injected into the prompt
    #[serde(default = "default_tool_summary_max_chars")]
    pub tool_summary_max_chars: usize,

    /// Fields never shown to the model, at any nesting depth
    #[serde(default = "default_redacted_fields")]
    pub redacted_fields: Vec<String>,

    /// Bound on a single escalation notification
    #[serde(default = "default_escalation_timeout_secs")]
    pub escalation_timeout_secs: u64,
}

fn default_max_tool_rounds() -> u32 {
    8
}
fn default_tool_summary_max_chars() -> usize {
    1500
}
fn default_redacted_fields() -> Vec<String> {
    vec![
        "cost_price".into(),
        "unit_cost".into(),
        "supplier_cost".into(),
        "margin".into(),
        "margin_pct".into(),
        "internal_notes".into(),
    ]
}
fn default_escalation_timeout_secs() -> u64 {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            tool_summary_max_chars: default_tool_summary_max_chars(),
            redacted_fields: default_redacted_fields(),
            escalation_timeout_secs: default_escalation_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub chat: ChannelSettings,

    #[serde(default = "ChannelSettings::email_default")]
    pub email: ChannelSettings,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            chat: ChannelSettings::default(),
            email: ChannelSettings::email_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Business name used in the default system prompt
    #[serde(default = "default_business_name")]
    pub business_name: String,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Strip greeting and sign-off lines the transport template supplies
    #[serde(default)]
    pub strip_envelope: bool,
}

fn default_business_name() -> String {
    "our company".into()
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            business_name: default_business_name(),
            system_prompt_override: None,
            strip_envelope: false,
        }
    }
}

impl ChannelSettings {
    fn email_default() -> Self {
        Self {
            strip_envelope: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Where escalations are POSTed. None = log only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// HMAC-SHA256 key for the `X-Concierge-Signature` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Base URL of the order/quote/invoice record service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lookup_timeout_secs() -> u64 {
    15
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.concierge/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CONCIERGE_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("CONCIERGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("CONCIERGE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CONCIERGE_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".concierge")
    }

    /// Resolved conversation-store location for the configured backend.
    pub fn memory_path(&self) -> PathBuf {
        match &self.memory.path {
            Some(p) => PathBuf::from(p),
            None if self.memory.backend == "file" => Self::config_dir().join("conversations"),
            None => Self::config_dir().join("concierge.sqlite"),
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.window == 0 || self.memory.window > 20 {
            return Err(ConfigError::ValidationError(
                "memory.window must be between 1 and 20".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "sqlite" | "file" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend '{}' is not one of sqlite, file, in_memory",
                self.memory.backend
            )));
        }

        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be at least 1".into(),
            ));
        }

        if self.agent.tool_summary_max_chars < 64 {
            return Err(ConfigError::ValidationError(
                "agent.tool_summary_max_chars must be at least 64".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            memory: MemoryConfig::default(),
            agent: AgentSettings::default(),
            channels: ChannelsConfig::default(),
            escalation: EscalationConfig::default(),
            lookup: LookupConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
