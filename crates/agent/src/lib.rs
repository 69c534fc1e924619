//! The orchestrator: tools, agents and the loop that lets a model use them.
//!
//! A request flows through these layers:
//!
//! 1. **[`Assistant::ask`]** appends the question to the root [`AgentSession`]
//! 2. **[`ConversationLoop`]** sends the history to the model
//! 3. **If capability calls**: the [`CapabilityDispatcher`] validates and runs
//!    them, results are appended, and the loop goes back to step 2
//! 4. **If text**: that is the answer
//!
//! A `delegate` call starts a nested [`AgentSession`] with its own history and
//! dispatcher, recording its calls one level deeper in the same call tracker.
//! The turn limit and the depth limit bound the work of every request.

pub mod agents;
pub mod assistant;
pub mod delegate;
pub mod dispatcher;
pub mod loop_runner;
pub mod prompt;
pub mod runtime;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agents::{Agent, AgentOutput, AgentRegistry, AgentSpec, ConversationalAgent, builtin_agents};
pub use assistant::{Assistant, AssistantStats};
pub use dispatcher::CapabilityDispatcher;
pub use loop_runner::ConversationLoop;
pub use runtime::{Runtime, Settings};
pub use session::AgentSession;
