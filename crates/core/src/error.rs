//! Error types for the agentrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the dispatch boundary
//! additionally classifies failures with an [`ErrorCategory`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all agentrelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Conversation loop errors ---
    #[error("Conversation error: {0}")]
    Loop(#[from] LoopError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of every failure the orchestrator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UnknownCapability,
    InvalidArguments,
    DepthLimitExceeded,
    ImplementationError,
    UnknownAgent,
    AgentDidNotConverge,
    TurnLimitExceeded,
    Cancelled,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCapability => "UnknownCapability",
            Self::InvalidArguments => "InvalidArguments",
            Self::DepthLimitExceeded => "DepthLimitExceeded",
            Self::ImplementationError => "ImplementationError",
            Self::UnknownAgent => "UnknownAgent",
            Self::AgentDidNotConverge => "AgentDidNotConverge",
            Self::TurnLimitExceeded => "TurnLimitExceeded",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Registration and lookup failures of a capability registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Capability name is reserved: {0}")]
    ReservedName(String),
}

/// A categorized failure produced at (or below) the dispatch boundary.
///
/// Never crosses into the conversation loop as an `Err`; the dispatcher folds
/// it into a `CapabilityResult` that is fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{category}: {message}")]
pub struct CapabilityError {
    pub category: ErrorCategory,
    pub message: String,
}

impl CapabilityError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn implementation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ImplementationError, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidArguments, message)
    }
}

impl From<RegistryError> for CapabilityError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::UnknownCapability(_) => {
                Self::new(ErrorCategory::UnknownCapability, err.to_string())
            }
            _ => Self::implementation(err.to_string()),
        }
    }
}

/// Loop-level conditions: the only failures that end a request.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    #[error("No final answer after {turns} turns")]
    TurnLimitExceeded { turns: u32 },

    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Language model unavailable: {0}")]
    Provider(#[from] ProviderError),
}

impl LoopError {
    /// The taxonomy bucket this failure belongs to.
    ///
    /// Transport failures have no category of their own; inside a delegated
    /// conversation they are reported as a non-converging agent.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TurnLimitExceeded { .. } => ErrorCategory::TurnLimitExceeded,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Provider(_) => ErrorCategory::AgentDidNotConverge,
        }
    }
}
