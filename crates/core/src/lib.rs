//! # AgentRelay Core
//!
//! Domain types, traits, and error definitions for the AgentRelay
//! orchestrator. This crate knows nothing about HTTP, configuration files or
//! concrete models; it defines the vocabulary every other crate speaks.
//!
//! - [`capability`]: capability contracts, argument validation, results
//! - [`registry`]: the name-keyed catalog of tools
//! - [`tracker`]: the per-request invocation ledger
//! - [`report`]: the call tree built from that ledger
//! - [`provider`]: the language-model abstraction

pub mod capability;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod registry;
pub mod report;
pub mod tracker;

// Re-export key types at crate root for ergonomics
pub use capability::{
    Arguments, CallId, Capability, CapabilityOutput, CapabilityResult, CapabilitySpec,
    CapabilityStatus, DELEGATE_CAPABILITY, ParamSpec, ParamType, TrackingContext,
};
pub use error::{CapabilityError, Error, ErrorCategory, LoopError, ProviderError, RegistryError, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{History, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use registry::CapabilityRegistry;
pub use report::{CallNode, CallReport};
pub use tracker::{CallTracker, InvocationRecord, RecordStatus};
