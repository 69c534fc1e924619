//! Specialized agents reachable through the `delegate` capability.
//!
//! An [`AgentSpec`] is registered once at startup; every delegation builds a
//! fresh implementation from its factory and runs it inside a fresh
//! [`AgentSession`], so nothing survives between two delegations.

pub mod deep_search;
pub mod query_improver;

use std::sync::Arc;

use agentrelay_core::error::{LoopError, RegistryError};
use async_trait::async_trait;
use serde_json::Value;

use crate::session::AgentSession;

pub use deep_search::DeepSearchAgent;
pub use query_improver::QueryImproverAgent;

/// What a finished agent hands back to the delegating conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub payload: Value,
    pub status_message: Option<String>,
}

impl AgentOutput {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            status_message: None,
        }
    }

    pub fn with_status(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }
}

/// The process an agent runs on its task.
///
/// The session already carries the agent's system prompt and a dispatcher
/// whose calls nest under the delegation; anything the agent does through it
/// shows up in the call tree.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, session: &mut AgentSession, task: &str) -> Result<AgentOutput, LoopError>;
}

/// An agent with no custom process: the plain conversation loop on the task.
#[derive(Debug, Default)]
pub struct ConversationalAgent;

#[async_trait]
impl Agent for ConversationalAgent {
    async fn run(&self, session: &mut AgentSession, task: &str) -> Result<AgentOutput, LoopError> {
        let answer = session.send(task).await?;
        Ok(AgentOutput::new(Value::String(answer)))
    }
}

/// Builds a new implementation for each delegation.
pub type AgentFactory = Arc<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Registration record of one agent.
#[derive(Clone)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    /// Template; `{current_date}` is filled in when a session is created.
    pub system_prompt: String,
    factory: AgentFactory,
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        factory: impl Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            factory: Arc::new(factory),
        }
    }

    /// An agent that just converses with its system prompt.
    pub fn conversational(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self::new(name, description, system_prompt, || Box::new(ConversationalAgent))
    }

    pub fn instantiate(&self) -> Box<dyn Agent> {
        (self.factory)()
    }
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Agents in registration order.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentSpec>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; a second agent with the same name is rejected.
    pub fn register(&mut self, spec: AgentSpec) -> Result<(), RegistryError> {
        if self.get(&spec.name).is_some() {
            return Err(RegistryError::DuplicateCapability(spec.name));
        }
        self.agents.push(spec);
        Ok(())
    }

    /// Build a registry from `specs` in order, stopping at the first duplicate.
    pub fn from_specs(specs: impl IntoIterator<Item = AgentSpec>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn list(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// `- name: description` lines for the root system prompt.
    pub fn descriptions(&self) -> String {
        self.agents
            .iter()
            .map(|a| format!("- {}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The agents every assistant starts with.
pub fn builtin_agents() -> Result<AgentRegistry, RegistryError> {
    AgentRegistry::from_specs([deep_search::spec(), query_improver::spec()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_agents_in_registration_order() {
        let agents = builtin_agents().unwrap();
        assert_eq!(agents.names(), vec!["deep_search", "query_improver"]);
        assert!(agents.get("deep_search").is_some());
        assert!(agents.get("nope").is_none());
    }

    #[test]
    fn duplicate_agent_rejected() {
        let mut agents = AgentRegistry::new();
        agents
            .register(AgentSpec::conversational("helper", "Helps", "You help."))
            .unwrap();
        let err = agents
            .register(AgentSpec::conversational("helper", "Helps again", "You help."))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCapability(name) if name == "helper"));
        assert_eq!(agents.len(), 1);
        assert_eq!(agents.get("helper").unwrap().description, "Helps");
    }

    #[test]
    fn from_specs_stops_at_duplicate() {
        let err = AgentRegistry::from_specs([
            AgentSpec::conversational("helper", "Helps", "You help."),
            AgentSpec::conversational("helper", "Helps again", "You help too."),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCapability(name) if name == "helper"));
    }

    #[test]
    fn descriptions_are_one_line_per_agent() {
        let agents = builtin_agents().unwrap();
        let text = agents.descriptions();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("- deep_search: "));
    }
}
