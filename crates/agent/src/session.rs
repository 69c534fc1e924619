//! Agent sessions: one conversation with its own prompt, history and dispatcher.

use agentrelay_core::capability::{CapabilityResult, TrackingContext};
use agentrelay_core::error::LoopError;
use agentrelay_core::message::{History, Message};
use agentrelay_core::provider::Usage;
use serde_json::Value;

use crate::dispatcher::CapabilityDispatcher;
use crate::loop_runner::ConversationLoop;

/// A model-facing conversation.
///
/// The session exclusively owns its history and dispatcher. Sessions never
/// reference their parent; the tracking context is the only link to the
/// call that created them.
pub struct AgentSession {
    history: History,
    dispatcher: CapabilityDispatcher,
    tracking: TrackingContext,
    usage: Usage,
}

impl AgentSession {
    pub fn new(
        system_prompt: impl Into<String>,
        dispatcher: CapabilityDispatcher,
        tracking: TrackingContext,
    ) -> Self {
        Self {
            history: History::with_system(system_prompt),
            dispatcher,
            tracking,
            usage: Usage::default(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        self.history
            .messages()
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn dispatcher(&self) -> &CapabilityDispatcher {
        &self.dispatcher
    }

    pub fn tracking(&self) -> &TrackingContext {
        &self.tracking
    }

    /// Token usage accumulated over every model call of this session.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn tokens_used(&self) -> u32 {
        self.usage.total_tokens
    }

    /// Append `text` as a user message and run the conversation loop to an answer.
    pub async fn send(&mut self, text: &str) -> Result<String, LoopError> {
        self.history.push(Message::user(text));
        ConversationLoop::new(&self.dispatcher, &self.tracking)
            .run(&mut self.history, &mut self.usage)
            .await
    }

    /// Dispatch a capability directly, nested under this session's tracking context.
    pub async fn call(&self, name: &str, arguments: Value) -> CapabilityResult {
        self.dispatcher.execute(name, arguments, &self.tracking).await
    }

    /// Drop everything but the system prompt.
    pub fn clear(&mut self) {
        self.history.reset_to_system();
    }

    /// Forget messages appended after the first `len`.
    pub fn rollback(&mut self, len: usize) {
        self.history.truncate(len.max(1));
    }

    /// Bind the session to another dispatcher, e.g. one with a fresh call tracker.
    pub fn replace_dispatcher(&mut self, dispatcher: CapabilityDispatcher) {
        self.dispatcher = dispatcher;
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("messages", &self.history.len())
            .field("tracking", &self.tracking)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
