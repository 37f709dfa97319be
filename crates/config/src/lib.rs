//! Configuration loading, validation, and management for docpilot.
//!
//! Loads configuration from `~/.docpilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docpilot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key (can be overridden per-provider)
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

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Product domain the assistant supports
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Workflow limits, timeouts and per-node models
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Document folder and index settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Web search tool settings
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Support-case lookup tool settings
    #[serde(default)]
    pub case_lookup: CaseLookupConfig,

    /// Checkpoint store settings
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

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
            .field("providers", &self.providers)
            .field("assistant", &self.assistant)
            .field("workflow", &self.workflow)
            .field("knowledge", &self.knowledge)
            .field("web_search", &self.web_search)
            .field("case_lookup", &self.case_lookup)
            .field("checkpoint", &self.checkpoint)
            .finish()
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

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// The product domain baked into the prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Vendor / product line name used to scope web searches
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Closely related product families that must never be conflated
    #[serde(default = "default_product_families")]
    pub product_families: Vec<String>,

    /// Replace the reasoning agent's system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_product_name() -> String {
    "Multitech".into()
}
fn default_product_families() -> Vec<String> {
    ["MTCDT", "MTCDTIP", "MTCAP", "MTCAP2", "MTCAP3", "xDot", "mDot"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            product_families: default_product_families(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Rewrites allowed per turn before the generator is forced
    #[serde(default = "default_max_rewrites")]
    pub max_rewrites: u32,

    /// Externally imposed limit on each model call
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Externally imposed limit on each tool call
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Extra attempts for a failing tool call (0 = no retry)
    #[serde(default)]
    pub tool_retry_attempts: u32,

    /// Show intermediate tool/grading activity to the user
    #[serde(default)]
    pub surface_tool_activity: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grader_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewriter_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_model: Option<String>,
}

fn default_max_rewrites() -> u32 {
    3
}
fn default_model_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    60
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_rewrites: default_max_rewrites(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            tool_retry_attempts: 0,
            surface_tool_activity: false,
            agent_model: None,
            grader_model: None,
            rewriter_model: None,
            generator_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Folder watched for support documents
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Where the index and processed-file record are kept
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Passages returned per retrieval
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_docs_dir() -> PathBuf {
    AppConfig::config_dir().join("docs")
}
fn default_persist_dir() -> PathBuf {
    AppConfig::config_dir().join("index")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    300
}
fn default_top_k() -> usize {
    4
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            persist_dir: default_persist_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub api_url: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Restrict results to these domains (empty = no restriction)
    #[serde(default)]
    pub include_domains: Vec<String>,
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    2
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_url: default_search_url(),
            max_results: default_max_results(),
            include_domains: vec![],
        }
    }
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_results", &self.max_results)
            .field("include_domains", &self.include_domains)
            .finish()
    }
}

/// The support-portal case lookup is registered only when enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseLookupConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// "memory", "file" or "sqlite"
    #[serde(default = "default_checkpoint_backend")]
    pub backend: String,

    /// Database file or directory, depending on the backend
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
}

fn default_checkpoint_backend() -> String {
    "sqlite".into()
}
fn default_checkpoint_path() -> PathBuf {
    AppConfig::config_dir().join("checkpoints.sqlite")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: default_checkpoint_path(),
        }
    }
}

const CHECKPOINT_BACKENDS: &[&str] = &["memory", "file", "sqlite"];

impl AppConfig {
    /// Load configuration from the default path (~/.docpilot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DOCPILOT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `TAVILY_API_KEY` for web search
    /// - `DOCPILOT_PROVIDER`, `DOCPILOT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("DOCPILOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if self.web_search.api_key.is_none() {
            self.web_search.api_key = lookup("TAVILY_API_KEY");
        }

        if let Some(provider) = lookup("DOCPILOT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("DOCPILOT_MODEL") {
            self.default_model = model;
        }
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
        dirs_home().join(".docpilot")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.knowledge.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_size must be > 0".into(),
            ));
        }

        if self.knowledge.chunk_overlap >= self.knowledge.chunk_size {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than knowledge.chunk_size".into(),
            ));
        }

        if !CHECKPOINT_BACKENDS.contains(&self.checkpoint.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "checkpoint.backend must be one of {CHECKPOINT_BACKENDS:?}, got '{}'",
                self.checkpoint.backend
            )));
        }

        Ok(())
    }

    /// Check if a model API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model for a node, falling back to `default_model`.
    pub fn model_for(&self, node_override: &Option<String>) -> String {
        node_override
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Generate a default config TOML string (for `onboard` command).
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
            providers: HashMap::new(),
            assistant: AssistantConfig::default(),
            workflow: WorkflowConfig::default(),
            knowledge: KnowledgeConfig::default(),
            web_search: WebSearchConfig::default(),
            case_lookup: CaseLookupConfig::default(),
            checkpoint: CheckpointConfig::default(),
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
