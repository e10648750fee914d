//! Stream error types.

use parlor_core::errors::ParlorError;
use parlor_core::ids::ConversationId;
use thiserror::Error;

/// Errors raised by the hub and publisher.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No live conversation with this id.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The publisher is shutting down and accepts no new subscriptions.
    #[error("publisher is shutting down")]
    ShuttingDown,

    /// A data model operation failed.
    #[error(transparent)]
    Core(#[from] ParlorError),
}

impl StreamError {
    /// Whether the error refers to something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ConversationNotFound(_) => true,
            Self::Core(e) => e.is_not_found(),
            Self::ShuttingDown => false,
        }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
