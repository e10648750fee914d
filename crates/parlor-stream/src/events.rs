//! Events pushed to subscribers.
//!
//! Every event serializes with a `type` discriminator and camelCase fields:
//!
//! ```text
//! snapshot    {type, seq, conversation}
//! node_update {type, seq, conversationId, nodeId, nodeIndex, node, updateAt, isGenerating}
//! error       {type, message}
//! invalidate  {type, assistantId, timestamp}
//! ```

use parlor_core::ids::{AssistantId, ConversationId, NodeId};
use serde::{Deserialize, Serialize};

use crate::diff::NodeDiff;
use crate::dto::{ConversationDto, MessageNodeDto};

/// Event on a single conversation's channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversationEvent {
    /// Full conversation state.
    Snapshot {
        /// Per-subscription sequence number.
        seq: u64,
        /// The conversation.
        conversation: ConversationDto,
    },
    /// Exactly one node changed.
    NodeUpdate {
        /// Per-subscription sequence number.
        seq: u64,
        /// Conversation id.
        conversation_id: ConversationId,
        /// Changed node id.
        node_id: NodeId,
        /// Changed node position.
        node_index: usize,
        /// The node as it is now.
        node: MessageNodeDto,
        /// Conversation update time (ms).
        update_at: i64,
        /// Whether a response is being generated.
        is_generating: bool,
    },
    /// A failure surfaced to the subscriber. Not sequenced.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl ConversationEvent {
    /// Node update event from a diff against `current`.
    #[must_use]
    pub fn node_update(seq: u64, current: &ConversationDto, diff: NodeDiff) -> Self {
        Self::NodeUpdate {
            seq,
            conversation_id: current.id.clone(),
            node_id: diff.node.id.clone(),
            node_index: diff.node_index,
            node: diff.node,
            update_at: current.update_at,
            is_generating: current.is_generating,
        }
    }

    /// Wire discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::NodeUpdate { .. } => "node_update",
            Self::Error { .. } => "error",
        }
    }

    /// Sequence number, absent for errors.
    #[must_use]
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Snapshot { seq, .. } | Self::NodeUpdate { seq, .. } => Some(*seq),
            Self::Error { .. } => None,
        }
    }
}

/// Event on the conversation list channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversationListEvent {
    /// Some conversation of the assistant changed; refetch the list.
    Invalidate {
        /// Affected assistant.
        assistant_id: AssistantId,
        /// Emission time (ms).
        timestamp: i64,
    },
}

impl ConversationListEvent {
    /// Wire discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Invalidate { .. } => "invalidate",
        }
    }
}
