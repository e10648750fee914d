//! Single-node change detection between two snapshots.
//!
//! Streaming generation grows one message at a time, so most updates touch
//! exactly one node. [`single_node_diff`] recognises that case; anything
//! else returns `None` and the caller sends a full snapshot instead.

use serde::{Deserialize, Serialize};

use crate::dto::{ConversationDto, MessageNodeDto};

/// One changed or appended node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDiff {
    /// Position of the node in the current snapshot.
    pub node_index: usize,
    /// The node as it is now.
    pub node: MessageNodeDto,
}

/// The single node that differs between `previous` and `current`, if the
/// change is exactly that.
///
/// Returns `None` when the snapshots belong to different conversations,
/// when any conversation-level field other than the update time and
/// generation flag changed, when nodes were removed, and when zero or
/// several nodes differ.
#[must_use]
pub fn single_node_diff(previous: &ConversationDto, current: &ConversationDto) -> Option<NodeDiff> {
    if previous.id != current.id
        || previous.assistant_id != current.assistant_id
        || previous.create_at != current.create_at
    {
        return None;
    }
    if previous.title != current.title
        || previous.truncate_index != current.truncate_index
        || previous.chat_suggestions != current.chat_suggestions
        || previous.is_pinned != current.is_pinned
    {
        return None;
    }
    if previous.messages.len() > current.messages.len() {
        return None;
    }

    let mut changed = None;
    for (index, node) in current.messages.iter().enumerate() {
        if previous.messages.get(index) == Some(node) {
            continue;
        }
        if changed.is_some() {
            return None;
        }
        changed = Some(index);
    }

    changed.map(|node_index| NodeDiff {
        node_index,
        node: current.messages[node_index].clone(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
