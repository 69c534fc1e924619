//! Shared outbound HTTP plumbing for the built-in tools.

use std::time::Duration;

use agentrelay_config::HttpConfig;
use agentrelay_core::CapabilityError;
use tracing::warn;

/// Build the client every tool uses: configured timeout and user agent.
pub fn build_client(config: &HttpConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a transport failure into an implementation error.
pub fn request_failed(context: &str, err: reqwest::Error) -> CapabilityError {
    if err.is_timeout() {
        CapabilityError::implementation(format!("{context}: request timed out"))
    } else {
        CapabilityError::implementation(format!("{context}: {err}"))
    }
}
