//! Error hierarchy for the Parlor engine.
//!
//! [`ParlorError`] covers the failures of the shared data model. Crates
//! with their own failure domains (settings, streaming, HTTP) define
//! narrower enums and convert into or wrap this one.

use thiserror::Error;

/// Top-level error type for the shared data model.
#[derive(Debug, Error)]
pub enum ParlorError {
    /// No conversation with this id is loaded.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// No node with this id exists in the conversation.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// No message with this id exists in the conversation.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// An externally supplied id is not a valid UUID.
    #[error("invalid {kind} id: {value}")]
    InvalidId {
        /// Which id type was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A branch selection past the end of a node's alternatives.
    #[error("branch {index} out of range for node {node_id} ({len} branches)")]
    BranchOutOfRange {
        /// Node whose selection was attempted.
        node_id: String,
        /// Requested index.
        index: usize,
        /// Number of branches in the node.
        len: usize,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("[{code}] {message}")]
    Internal {
        /// Machine-readable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl ParlorError {
    /// Create an internal error with a code and message.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            Self::NodeNotFound(_) => "NODE_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::InvalidId { .. } => "INVALID_ID",
            Self::BranchOutOfRange { .. } => "BRANCH_OUT_OF_RANGE",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal { code, .. } => code,
        }
    }

    /// Whether the error is caused by a reference to something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_) | Self::NodeNotFound(_) | Self::MessageNotFound(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParlorError>;
