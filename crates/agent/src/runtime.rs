//! Read-only state shared by every session of a process.
//!
//! The registries, the provider and the limits are fixed once the runtime is
//! built; requests only ever read them, so sessions share one `Arc<Runtime>`
//! without locking.

use std::sync::Arc;
use std::time::Duration;

use agentrelay_config::{AppConfig, TurnLimitPolicy};
use agentrelay_core::event::EventBus;
use agentrelay_core::provider::Provider;
use agentrelay_core::registry::CapabilityRegistry;

use crate::agents::AgentRegistry;

/// Model parameters and safety limits.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Calls may be opened at depths `0..max_depth`.
    pub max_depth: u32,
    /// Model round trips allowed per conversation.
    pub max_turns: u32,
    pub parallel_tool_calls: bool,
    pub on_turn_limit: TurnLimitPolicy,
    pub request_timeout: Duration,
    pub context_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        let orchestrator = &config.orchestrator;
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_depth: orchestrator.max_depth,
            max_turns: orchestrator.max_turns,
            parallel_tool_calls: orchestrator.parallel_tool_calls,
            on_turn_limit: orchestrator.on_turn_limit,
            request_timeout: Duration::from_secs(orchestrator.request_timeout_secs),
            context_size: config.context_size as usize,
        }
    }
}

/// Everything a dispatcher needs besides the per-request call tracker.
pub struct Runtime {
    pub provider: Arc<dyn Provider>,
    pub tools: CapabilityRegistry,
    pub agents: AgentRegistry,
    pub settings: Settings,
    pub events: Arc<EventBus>,
}

impl Runtime {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: CapabilityRegistry,
        agents: AgentRegistry,
        settings: Settings,
    ) -> Self {
        Self {
            provider,
            tools,
            agents,
            settings,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Publish domain events on an existing bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .field("agents", &self.agents.names())
            .field("settings", &self.settings)
            .finish()
    }
}
