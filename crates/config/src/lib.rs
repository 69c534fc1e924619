//! Configuration loading, validation, and management for AgentRelay.
//!
//! Loads configuration from `~/.agentrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentrelay/config.toml`.
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

    /// Context window of the default model, in tokens
    #[serde(default = "default_context_size")]
    pub context_size: u32,

    /// Providers tried in order after the default one fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Dispatch limits and loop behaviour
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Outbound HTTP settings shared by the tools
    #[serde(default)]
    pub http: HttpConfig,

    /// Webpage reader settings
    #[serde(default)]
    pub reader: ReaderConfig,

    /// GitHub API access
    #[serde(default)]
    pub github: GithubConfig,

    /// Terminal presentation
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.6
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_context_size() -> u32 {
    128_000
}
fn default_true() -> bool {
    true
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
            .field("context_size", &self.context_size)
            .field("fallback_providers", &self.fallback_providers)
            .field("providers", &self.providers)
            .field("orchestrator", &self.orchestrator)
            .field("search", &self.search)
            .field("http", &self.http)
            .field("reader", &self.reader)
            .field("github", &self.github)
            .field("ui", &self.ui)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-request timeout when this provider is part of a fallback chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// What the conversation loop does when it runs out of turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnLimitPolicy {
    /// Stop with a turn-limit error.
    #[default]
    Fail,
    /// Ask the model once more, without tools, for a best-effort answer.
    FinalAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Calls at this depth or deeper are rejected
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Model round trips per conversation
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Run the tool calls of one turn concurrently
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// Wall-clock budget for one top-level request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub on_turn_limit: TurnLimitPolicy,
}

fn default_max_depth() -> u32 {
    3
}
fn default_max_turns() -> u32 {
    5
}
fn default_request_timeout() -> u64 {
    600
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_turns: default_max_turns(),
            parallel_tool_calls: true,
            request_timeout_secs: default_request_timeout(),
            on_turn_limit: TurnLimitPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_searxng_url")]
    pub searxng_url: String,

    #[serde(default = "default_results_count")]
    pub results_count: u32,
}

pub const MAX_RESULTS_COUNT: u32 = 30;

fn default_searxng_url() -> String {
    "http://localhost:8080".into()
}
fn default_results_count() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            searxng_url: default_searxng_url(),
            results_count: default_results_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .into()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_max_length() -> usize {
    8000
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_github_api")]
    pub api_url: String,
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api(),
        }
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &redact(&self.token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_tool_reports: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_tool_reports: true,
            colored: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentrelay/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `AGENTRELAY_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("AGENTRELAY_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("AGENTRELAY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("AGENTRELAY_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("AGENTRELAY_SEARXNG_URL") {
            self.search.searxng_url = url;
        }
        if self.github.token.is_none() {
            self.github.token = lookup("GITHUB_TOKEN");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.orchestrator.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_turns must be at least 1".into(),
            ));
        }
        if self.orchestrator.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_depth must be at least 1".into(),
            ));
        }
        if !(1..=MAX_RESULTS_COUNT).contains(&self.search.results_count) {
            return Err(ConfigError::ValidationError(format!(
                "search.results_count must be between 1 and {MAX_RESULTS_COUNT}"
            )));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
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
            context_size: default_context_size(),
            fallback_providers: vec![],
            providers: HashMap::new(),
            orchestrator: OrchestratorConfig::default(),
            search: SearchConfig::default(),
            http: HttpConfig::default(),
            reader: ReaderConfig::default(),
            github: GithubConfig::default(),
            ui: UiConfig::default(),
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

impl From<ConfigError> for agentrelay_core::Error {
    fn from(e: ConfigError) -> Self {
        agentrelay_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.orchestrator.max_depth, 3);
        assert_eq!(config.orchestrator.max_turns, 5);
        assert_eq!(config.orchestrator.on_turn_limit, TurnLimitPolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.search.searxng_url, config.search.searxng_url);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.max_turns = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orchestrator.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.results_count = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn load_from_file_with_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "openai/gpt-4o"
fallback_providers = ["openai"]

[orchestrator]
max_depth = 2
parallel_tool_calls = false
on_turn_limit = "final_answer"

[search]
searxng_url = "http://search.local"
results_count = 5

[providers.openai]
api_key = "sk-test"
timeout_secs = 30
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "openai/gpt-4o");
        assert_eq!(config.fallback_providers, vec!["openai".to_string()]);
        assert_eq!(config.orchestrator.max_depth, 2);
        assert_eq!(config.orchestrator.max_turns, 5);
        assert!(!config.orchestrator.parallel_tool_calls);
        assert_eq!(config.orchestrator.on_turn_limit, TurnLimitPolicy::FinalAnswer);
        assert_eq!(config.search.results_count, 5);
        assert_eq!(config.providers["openai"].timeout_secs, Some(30));
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth = [").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENAI_API_KEY", "oa-key"),
            ("AGENTRELAY_MODEL", "openai/gpt-4o"),
            ("AGENTRELAY_SEARXNG_URL", "http://searx:8888"),
            ("GITHUB_TOKEN", "ghp_x"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.default_model, "openai/gpt-4o");
        assert_eq!(config.search.searxng_url, "http://searx:8888");
        assert_eq!(config.github.token.as_deref(), Some("ghp_x"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.github.token = Some("ghp_secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("[orchestrator]"));
    }
}
