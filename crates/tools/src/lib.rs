//! Built-in tools for AgentRelay.
//!
//! Tools give the model read access to the outside world: web search through
//! SearXNG, readable webpage text, and GitHub repositories. Each one is a
//! [`Capability`](agentrelay_core::Capability) registered at startup.

pub mod github_read;
pub mod http;
pub mod search_web;
pub mod webpage_reader;

use std::sync::Arc;

use agentrelay_config::AppConfig;
use agentrelay_core::{CapabilityRegistry, RegistryError};

pub use github_read::GithubReadTool;
pub use search_web::SearchWebTool;
pub use webpage_reader::WebpageReaderTool;

/// Create the tool registry from the startup manifest.
pub fn default_registry(config: &AppConfig) -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(SearchWebTool::new(config)))?;
    registry.register(Arc::new(WebpageReaderTool::new(config)))?;
    registry.register(Arc::new(GithubReadTool::new(config)))?;
    Ok(registry)
}
