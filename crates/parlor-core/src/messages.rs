//! Chat message model.
//!
//! A [`Message`] carries a [`MessageRole`] and an ordered list of
//! [`MessagePart`]s. Only text parts take part in keyword scanning and
//! injection; the other part kinds pass through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
}

impl MessageRole {
    /// Wire name (`SYSTEM`, `USER`, `ASSISTANT`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parts
// ─────────────────────────────────────────────────────────────────────────────

/// One piece of message content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MessagePart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Image reference.
    Image {
        /// Location of the image (URL or data URI).
        url: String,
    },
    /// Attached document.
    Document {
        /// Location of the document.
        url: String,
        /// Original file name.
        file_name: String,
        /// MIME type.
        mime: String,
    },
    /// Model reasoning trace.
    Reasoning {
        /// The reasoning text.
        reasoning: String,
    },
    /// A tool invocation and, once finished, its output.
    Tool {
        /// Provider-assigned call id.
        tool_call_id: String,
        /// Tool name.
        tool_name: String,
        /// Raw JSON arguments.
        input: serde_json::Value,
        /// Tool output, absent while the call is pending.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
    },
}

impl MessagePart {
    /// Create a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text content if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage
// ─────────────────────────────────────────────────────────────────────────────

/// Token accounting reported by the provider for a finished message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens.
    pub prompt_tokens: u32,
    /// Completion tokens.
    pub completion_tokens: u32,
    /// Prompt tokens served from cache.
    #[serde(default)]
    pub cached_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id (distinct from the owning node's id).
    pub id: MessageId,
    /// Author role.
    pub role: MessageRole,
    /// Ordered content parts.
    pub parts: Vec<MessagePart>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When generation finished, if it has.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Model that produced this message.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Token usage.
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    /// Translated text, if the user requested one.
    #[serde(default)]
    pub translation: Option<String>,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(role: MessageRole, parts: Vec<MessagePart>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            parts,
            created_at: Utc::now(),
            finished_at: None,
            model_id: None,
            usage: None,
            translation: None,
        }
    }

    /// System message with a single text part.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![MessagePart::text(text)])
    }

    /// User message with a single text part.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![MessagePart::text(text)])
    }

    /// Assistant message with a single text part.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![MessagePart::text(text)])
    }

    /// Concatenation of all text parts, in order.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_text).collect()
    }

    /// Append text to the last text part, or push a new text part.
    pub fn append_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::text(delta));
        }
    }

    /// Whether generation of this message has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_concatenates_only_text_parts() {
        let msg = Message::new(
            MessageRole::User,
            vec![
                MessagePart::text("hello "),
                MessagePart::Image {
                    url: "https://example.com/a.png".into(),
                },
                MessagePart::text("world"),
            ],
        );
        assert_eq!(msg.text(), "hello world");
    }

    #[test]
    fn text_of_non_text_message_is_empty() {
        let msg = Message::new(
            MessageRole::Assistant,
            vec![MessagePart::Reasoning {
                reasoning: "thinking".into(),
            }],
        );
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn append_text_extends_last_part() {
        let mut msg = Message::assistant("Hel");
        msg.append_text("lo");
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.text(), "Hello");
    }

    #[test]
    fn append_text_after_tool_part_pushes_new_part() {
        let mut msg = Message::new(
            MessageRole::Assistant,
            vec![MessagePart::Tool {
                tool_call_id: "c1".into(),
                tool_name: "search".into(),
                input: json!({"q": "rust"}),
                output: None,
            }],
        );
        msg.append_text("done");
        assert_eq!(msg.parts.len(), 2);
        assert_eq!(msg.text(), "done");
    }

    #[test]
    fn role_serializes_upper_case() {
        assert_eq!(
            serde_json::to_value(MessageRole::Assistant).unwrap(),
            json!("ASSISTANT")
        );
        assert_eq!(MessageRole::System.to_string(), "SYSTEM");
    }

    #[test]
    fn part_wire_shape() {
        let part = MessagePart::Document {
            url: "file:///a.pdf".into(),
            file_name: "a.pdf".into(),
            mime: "application/pdf".into(),
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v["type"], "document");
        assert_eq!(v["fileName"], "a.pdf");
    }

    #[test]
    fn pending_tool_part_omits_output() {
        let part = MessagePart::Tool {
            tool_call_id: "c1".into(),
            tool_name: "search".into(),
            input: json!({}),
            output: None,
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v["toolCallId"], "c1");
        assert!(v.get("output").is_none());
    }

    #[test]
    fn message_is_finished() {
        let mut msg = Message::user("hi");
        assert!(!msg.is_finished());
        msg.finished_at = Some(Utc::now());
        assert!(msg.is_finished());
    }
}
