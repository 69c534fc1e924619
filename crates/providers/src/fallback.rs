//! Provider fallback: an ordered chain with per-provider timeouts.
//!
//! When a provider fails (timeout, rate limit, transport error) the next one
//! in the chain gets the same request. The conversation loop only sees the
//! last error, and only if every entry failed.

use async_trait::async_trait;
use agentrelay_core::error::ProviderError;
use agentrelay_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout applied when an entry is added without one.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A provider that wraps an ordered list of providers and falls back on failure.
pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl FallbackEntry {
    async fn attempt(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
        }
    }
}

impl FallbackProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Append a provider with its own timeout.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }

    pub fn add_default(self, provider: Arc<dyn Provider>) -> Self {
        self.add(provider, DEFAULT_ATTEMPT_TIMEOUT)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Names of the chained providers, in attempt order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.name()).collect()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name();
            info!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            match entry.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(provider = %provider_name, error = %e, "Fallback: provider failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrelay_core::message::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `error` when set, answers "success" otherwise.
    struct CountingProvider {
        name: String,
        error: Option<ProviderError>,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn ok(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: Some(error),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(ProviderResponse {
                    message: Message::assistant("success"),
                    usage: None,
                    model: "test-model".into(),
                }),
            }
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            std::future::pending().await
        }
    }

    fn test_request() -> ProviderRequest {
        ProviderRequest {
            model: "test".into(),
            messages: vec![Message::user("hello")],
            temperature: 0.6,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn first_provider_succeeds() {
        let p1 = CountingProvider::ok("primary");
        let p2 = CountingProvider::ok("secondary");
        let fallback = FallbackProvider::new("test")
            .add_default(p1.clone())
            .add_default(p2.clone());

        let response = fallback.complete(test_request()).await.unwrap();
        assert_eq!(response.message.content, "success");
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn falls_back_on_failure() {
        let p1 = CountingProvider::failing(
            "primary",
            ProviderError::RateLimited {
                retry_after_secs: 60,
            },
        );
        let p2 = CountingProvider::ok("secondary");
        let fallback = FallbackProvider::new("test")
            .add_default(p1.clone())
            .add_default(p2.clone());

        assert!(fallback.complete(test_request()).await.is_ok());
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn all_providers_fail_returns_last_error() {
        let fallback = FallbackProvider::new("test")
            .add_default(CountingProvider::failing(
                "primary",
                ProviderError::Network("conn refused".into()),
            ))
            .add_default(CountingProvider::failing(
                "secondary",
                ProviderError::AuthenticationFailed("bad key".into()),
            ));

        match fallback.complete(test_request()).await.unwrap_err() {
            ProviderError::AuthenticationFailed(_) => {}
            other => panic!("Expected AuthenticationFailed, got: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_triggers_fallback() {
        let p2 = CountingProvider::ok("secondary");
        let fallback = FallbackProvider::new("test")
            .add(Arc::new(HangingProvider), Duration::from_millis(50))
            .add_default(p2.clone());

        assert!(fallback.complete(test_request()).await.is_ok());
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn empty_chain_returns_not_configured() {
        let fallback = FallbackProvider::new("empty");
        assert!(fallback.is_empty());
        assert!(matches!(
            fallback.complete(test_request()).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
