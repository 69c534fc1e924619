//! Provider router: selects the LLM provider (or fallback chain) from config.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentrelay_config::AppConfig;
use agentrelay_core::error::ProviderError;
use agentrelay_core::provider::Provider;
use tracing::debug;

use crate::fallback::{DEFAULT_ATTEMPT_TIMEOUT, FallbackProvider};
use crate::openai_compat::OpenAiCompatProvider;

/// Named providers plus the one requests go to by default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    timeouts: HashMap<String, Duration>,
    default_provider: String,
    fallbacks: Vec<String>,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            timeouts: HashMap::new(),
            default_provider: default_provider.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Providers tried, in order, after the default one fails.
    pub fn with_fallbacks(mut self, names: Vec<String>) -> Self {
        self.fallbacks = names;
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// The provider the conversation loop should talk to.
    ///
    /// Without fallbacks this is the default provider itself; otherwise a
    /// [`FallbackProvider`] over the default followed by each fallback.
    pub fn primary(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        let default = self.get(&self.default_provider).ok_or_else(|| {
            ProviderError::NotConfigured(format!("unknown provider '{}'", self.default_provider))
        })?;
        if self.fallbacks.is_empty() {
            return Ok(default);
        }

        let mut chain = FallbackProvider::new(format!("{}+fallback", self.default_provider))
            .add(default, self.timeout_for(&self.default_provider));
        for name in &self.fallbacks {
            let provider = self.get(name).ok_or_else(|| {
                ProviderError::NotConfigured(format!("unknown fallback provider '{name}'"))
            })?;
            chain = chain.add(provider, self.timeout_for(name));
        }
        debug!(chain = ?chain.provider_names(), "Built provider fallback chain");
        Ok(Arc::new(chain))
    }

    fn timeout_for(&self, name: &str) -> Duration {
        self.timeouts.get(name).copied().unwrap_or(DEFAULT_ATTEMPT_TIMEOUT)
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` entry becomes an OpenAI-compatible client; the
/// default provider and every fallback exist even when not configured
/// explicitly, using the root API key and the well-known base URL.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider)
        .with_fallbacks(config.fallback_providers.clone());

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));
        let timeout = provider_config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT);

        router.timeouts.insert(name.clone(), timeout);
        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::with_timeout(name, base_url, api_key, timeout)),
        );
    }

    let implicit: Vec<String> = std::iter::once(config.default_provider.clone())
        .chain(config.fallback_providers.iter().cloned())
        .filter(|name| router.get(name).is_none())
        .collect();
    for name in implicit {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&name);
        router.register(name.clone(), Arc::new(OpenAiCompatProvider::new(&name, base_url, api_key)));
    }

    router
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
