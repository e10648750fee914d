//! Branded ID newtypes for type safety.
//!
//! Every entity in Parlor has a distinct ID type implemented as a newtype
//! wrapper around `String`. This prevents accidentally passing a node ID
//! where a message ID is expected, which matters for the diff protocol:
//! node ids and message ids are deliberately distinct.
//!
//! New IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value without validation.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Parse an externally supplied ID, requiring a well-formed UUID.
            ///
            /// The canonical hyphenated lowercase form is stored regardless
            /// of how the input was written.
            pub fn parse(s: &str) -> crate::errors::Result<Self> {
                Uuid::parse_str(s.trim())
                    .map(|uuid| Self(uuid.to_string()))
                    .map_err(|_| crate::errors::ParlorError::InvalidId {
                        kind: $kind,
                        value: s.to_owned(),
                    })
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a conversation.
    ConversationId, "conversation"
}

branded_id! {
    /// Unique identifier for a message node (a branch point).
    NodeId, "node"
}

branded_id! {
    /// Unique identifier for a single message within a node.
    MessageId, "message"
}

branded_id! {
    /// Unique identifier for an assistant persona.
    AssistantId, "assistant"
}

branded_id! {
    /// Unique identifier for a prompt injection (mode injection or lorebook entry).
    InjectionId, "injection"
}

branded_id! {
    /// Unique identifier for a lorebook.
    LorebookId, "lorebook"
}

branded_id! {
    /// Unique identifier for a reported chat error.
    ErrorId, "error"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
