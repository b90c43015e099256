//! Error types for the Chatflow engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Chatflow workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. The variants mirror the
/// engine's failure taxonomy: construction-time failures
/// (`GraphValidation`), per-turn fatal failures (`NodeNotFound`, `Storage`,
/// `ResponseComputation`, `TurnTimeout`) and localized non-fatal failures
/// (`ConditionEvaluation`).
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ChatflowError {
    /// Script graph validation failed at construction time.
    ///
    /// Carries every problem found, not just the first one, so script
    /// authors can fix a broken script in one pass.
    #[error("Script validation failed with {} issue(s): {}", .issues.len(), .issues.join("; "))]
    GraphValidation { issues: Vec<String> },

    /// A node address did not resolve against the script graph.
    ///
    /// During a turn this indicates graph/context drift, e.g. a script was
    /// redeployed with a node removed while saved contexts still point at it.
    #[error("Node not found: '{flow}:{node}'")]
    NodeNotFound { flow: String, node: String },

    /// Context store failure (load or save). Fatal for the turn; persisted
    /// context is assumed unchanged from before the turn.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A condition handler failed internally. Non-fatal: the transition is
    /// treated as not matched and the turn continues.
    #[error("Condition '{handler}' failed: {message}")]
    ConditionEvaluation { handler: String, message: String },

    /// A response handler failed. Fatal for the turn; context is not saved.
    #[error("Response handler '{handler}' failed: {message}")]
    ResponseComputation { handler: String, message: String },

    /// The turn exceeded its configured deadline. Context is not saved.
    #[error("Turn timed out after {millis}ms")]
    TurnTimeout { millis: u64 },

    /// Messenger send/receive failure. A send failure after a successful
    /// save leaves the saved context in place.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatflowError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a GraphValidation error from a list of issues.
    pub fn graph_validation(issues: Vec<String>) -> Self {
        Self::GraphValidation { issues }
    }

    /// Creates a NodeNotFound error.
    pub fn node_not_found(flow: impl Into<String>, node: impl Into<String>) -> Self {
        Self::NodeNotFound {
            flow: flow.into(),
            node: node.into(),
        }
    }

    /// Creates a Storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a ConditionEvaluation error.
    pub fn condition(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConditionEvaluation {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Creates a ResponseComputation error.
    pub fn response(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResponseComputation {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Creates a Transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a GraphValidation error.
    pub fn is_graph_validation(&self) -> bool {
        matches!(self, Self::GraphValidation { .. })
    }

    /// Check if this is a NodeNotFound error.
    pub fn is_node_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound { .. })
    }

    /// Check if this is a Storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Check if this is a ConditionEvaluation error.
    pub fn is_condition(&self) -> bool {
        matches!(self, Self::ConditionEvaluation { .. })
    }

    /// Check if this is a ResponseComputation error.
    pub fn is_response(&self) -> bool {
        matches!(self, Self::ResponseComputation { .. })
    }

    /// Check if this is a TurnTimeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TurnTimeout { .. })
    }

    /// Check if this is a Transport error.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the error is fatal for the turn it occurred in.
    ///
    /// Condition evaluation failures are the only non-fatal variant: they
    /// are swallowed at the transition level and the turn continues.
    pub fn is_fatal_for_turn(&self) -> bool {
        !self.is_condition()
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ChatflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ChatflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChatflowError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ChatflowError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from String (for error messages)
impl From<String> for ChatflowError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, ChatflowError>`.
pub type Result<T> = std::result::Result<T, ChatflowError>;
