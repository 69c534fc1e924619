//! Domain events published while a request is being answered.
//!
//! The orchestrator never prints; front-ends subscribe to the bus to show
//! progress (which capability is running, which agent got a task) or to
//! collect statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::capability::CallId;
use crate::error::ErrorCategory;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A capability invocation was opened and is about to run
    CapabilityStarted {
        call_id: CallId,
        capability: String,
        depth: u32,
        timestamp: DateTime<Utc>,
    },

    /// A capability invocation was closed
    CapabilityFinished {
        call_id: CallId,
        capability: String,
        success: bool,
        category: Option<ErrorCategory>,
        status_message: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A task was handed to a specialized agent
    AgentDelegated {
        call_id: CallId,
        agent: String,
        task_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a turn's response
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. A lagging
/// subscriber loses the oldest events rather than slowing publishers.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
