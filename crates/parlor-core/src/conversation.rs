//! Conversation tree: nodes (branch points) ordered into a conversation.
//!
//! A [`MessageNode`] holds one or more alternative [`Message`]s produced by
//! regeneration and tracks which one is selected. A [`Conversation`] is an
//! ordered list of nodes plus metadata. The flattened message view used
//! for prompt assembly takes the selected message of every node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ParlorError, Result};
use crate::ids::{AssistantId, ConversationId, MessageId, NodeId};
use crate::messages::Message;

// ─────────────────────────────────────────────────────────────────────────────
// MessageNode
// ─────────────────────────────────────────────────────────────────────────────

/// A branch point holding alternative messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNode {
    /// Stable node id, distinct from any message id.
    pub id: NodeId,
    /// Alternative messages (regeneration branches).
    pub messages: Vec<Message>,
    /// Index of the selected branch.
    pub select_index: usize,
}

impl MessageNode {
    /// Node containing a single message.
    #[must_use]
    pub fn of(message: Message) -> Self {
        Self {
            id: NodeId::new(),
            messages: vec![message],
            select_index: 0,
        }
    }

    /// The selected message.
    ///
    /// An out-of-range selection falls back to the last branch.
    #[must_use]
    pub fn current_message(&self) -> Option<&Message> {
        self.messages
            .get(self.select_index)
            .or_else(|| self.messages.last())
    }

    /// Mutable access to the selected message.
    pub fn current_message_mut(&mut self) -> Option<&mut Message> {
        let idx = self.select_index.min(self.messages.len().saturating_sub(1));
        self.messages.get_mut(idx)
    }

    /// Add a regeneration branch and select it.
    pub fn push_branch(&mut self, message: Message) {
        self.messages.push(message);
        self.select_index = self.messages.len() - 1;
    }

    /// Switch to another branch.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.messages.len() {
            return Err(ParlorError::BranchOutOfRange {
                node_id: self.id.to_string(),
                index,
                len: self.messages.len(),
            });
        }
        self.select_index = index;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered sequence of message nodes plus metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Assistant persona this conversation belongs to.
    pub assistant_id: AssistantId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Ordered nodes.
    #[serde(default)]
    pub nodes: Vec<MessageNode>,
    /// Nodes before this index are excluded from model context.
    #[serde(default)]
    pub truncate_index: Option<usize>,
    /// Follow-up suggestions offered to the user.
    #[serde(default)]
    pub chat_suggestions: Vec<String>,
    /// Pinned in the conversation list.
    #[serde(default)]
    pub is_pinned: bool,
    /// Creation time.
    pub create_at: DateTime<Utc>,
    /// Last modification time.
    pub update_at: DateTime<Utc>,
}

impl Conversation {
    /// Empty conversation for an assistant.
    #[must_use]
    pub fn new(assistant_id: AssistantId) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            assistant_id,
            title: String::new(),
            nodes: Vec::new(),
            truncate_index: None,
            chat_suggestions: Vec::new(),
            is_pinned: false,
            create_at: now,
            update_at: now,
        }
    }

    /// Selected message of every node, in order.
    #[must_use]
    pub fn current_messages(&self) -> Vec<Message> {
        self.nodes
            .iter()
            .filter_map(MessageNode::current_message)
            .cloned()
            .collect()
    }

    /// Selected messages from the truncation point onward.
    ///
    /// A truncation index past the end yields an empty list.
    #[must_use]
    pub fn context_messages(&self) -> Vec<Message> {
        let start = self.truncate_index.unwrap_or(0).min(self.nodes.len());
        self.nodes[start..]
            .iter()
            .filter_map(MessageNode::current_message)
            .cloned()
            .collect()
    }

    /// Append a message as a new node and return the node id.
    pub fn append_message(&mut self, message: Message) -> NodeId {
        let node = MessageNode::of(message);
        let id = node.id.clone();
        self.nodes.push(node);
        self.touch();
        id
    }

    /// Find the node containing a message, with its index.
    #[must_use]
    pub fn find_node_of_message(&self, message_id: &MessageId) -> Option<(usize, &MessageNode)> {
        self.nodes
            .iter()
            .enumerate()
            .find(|(_, node)| node.messages.iter().any(|m| &m.id == message_id))
    }

    /// Node by id.
    pub fn node_mut(&mut self, node_id: &NodeId) -> Result<&mut MessageNode> {
        self.nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| ParlorError::NodeNotFound(node_id.to_string()))
    }

    /// Message by id across all branches.
    pub fn message_mut(&mut self, message_id: &MessageId) -> Result<&mut Message> {
        self.nodes
            .iter_mut()
            .flat_map(|n| n.messages.iter_mut())
            .find(|m| &m.id == message_id)
            .ok_or_else(|| ParlorError::MessageNotFound(message_id.to_string()))
    }

    /// Remove every node from `index` onward.
    pub fn truncate_nodes(&mut self, index: usize) {
        self.nodes.truncate(index);
        if self.truncate_index.is_some_and(|t| t > self.nodes.len()) {
            self.truncate_index = Some(self.nodes.len());
        }
        self.touch();
    }

    /// Bump the modification time.
    pub fn touch(&mut self) {
        self.update_at = Utc::now();
    }
}
