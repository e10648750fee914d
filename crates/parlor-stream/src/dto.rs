//! Transport representations of conversation state.
//!
//! DTOs compare by value, recursively; the diff detector relies on this.
//! Timestamps are epoch milliseconds and a missing truncation index is `-1`.

use parlor_core::ids::{AssistantId, ConversationId, MessageId, NodeId};
use parlor_core::messages::{MessagePart, MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};

/// A single message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    /// Message id.
    pub id: MessageId,
    /// Author role.
    pub role: MessageRole,
    /// Content parts.
    pub parts: Vec<MessagePart>,
    /// Creation time (ms).
    pub created_at: i64,
    /// Generation finish time (ms).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<i64>,
    /// Producing model.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model_id: Option<String>,
    /// Token usage.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<TokenUsage>,
    /// Translation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub translation: Option<String>,
}

/// A branch point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNodeDto {
    /// Node id.
    pub id: NodeId,
    /// Alternative messages.
    pub messages: Vec<MessageDto>,
    /// Selected branch.
    pub select_index: usize,
}

/// Full conversation snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    /// Conversation id.
    pub id: ConversationId,
    /// Owning assistant.
    pub assistant_id: AssistantId,
    /// Title.
    pub title: String,
    /// Ordered nodes.
    pub messages: Vec<MessageNodeDto>,
    /// First node included in model context, `-1` when unset.
    pub truncate_index: i64,
    /// Suggested follow-ups.
    pub chat_suggestions: Vec<String>,
    /// Pinned flag.
    pub is_pinned: bool,
    /// Creation time (ms).
    pub create_at: i64,
    /// Last update (ms).
    pub update_at: i64,
    /// Whether a response is being generated.
    pub is_generating: bool,
}

/// Conversation list entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListDto {
    /// Conversation id.
    pub id: ConversationId,
    /// Owning assistant.
    pub assistant_id: AssistantId,
    /// Title.
    pub title: String,
    /// Pinned flag.
    pub is_pinned: bool,
    /// Creation time (ms).
    pub create_at: i64,
    /// Last update (ms).
    pub update_at: i64,
    /// Whether a response is being generated.
    pub is_generating: bool,
}
