//! Conversation to DTO mapping.

use parlor_core::conversation::{Conversation, MessageNode};
use parlor_core::messages::Message;

use crate::dto::{ConversationDto, ConversationListDto, MessageDto, MessageNodeDto};

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            role: m.role,
            parts: m.parts.clone(),
            created_at: m.created_at.timestamp_millis(),
            finished_at: m.finished_at.map(|t| t.timestamp_millis()),
            model_id: m.model_id.clone(),
            usage: m.usage,
            translation: m.translation.clone(),
        }
    }
}

impl From<&MessageNode> for MessageNodeDto {
    fn from(node: &MessageNode) -> Self {
        Self {
            id: node.id.clone(),
            messages: node.messages.iter().map(MessageDto::from).collect(),
            select_index: node.select_index,
        }
    }
}

/// Snapshot of `conversation` with the generation flag.
#[must_use]
pub fn build_snapshot(conversation: &Conversation, is_generating: bool) -> ConversationDto {
    ConversationDto {
        id: conversation.id.clone(),
        assistant_id: conversation.assistant_id.clone(),
        title: conversation.title.clone(),
        messages: conversation.nodes.iter().map(MessageNodeDto::from).collect(),
        truncate_index: conversation
            .truncate_index
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(-1),
        chat_suggestions: conversation.chat_suggestions.clone(),
        is_pinned: conversation.is_pinned,
        create_at: conversation.create_at.timestamp_millis(),
        update_at: conversation.update_at.timestamp_millis(),
        is_generating,
    }
}

/// List entry for `conversation`.
#[must_use]
pub fn build_list_item(conversation: &Conversation, is_generating: bool) -> ConversationListDto {
    ConversationListDto {
        id: conversation.id.clone(),
        assistant_id: conversation.assistant_id.clone(),
        title: conversation.title.clone(),
        is_pinned: conversation.is_pinned,
        create_at: conversation.create_at.timestamp_millis(),
        update_at: conversation.update_at.timestamp_millis(),
        is_generating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::ids::AssistantId;
    use parlor_core::messages::TokenUsage;
    use serde_json::Value;

    fn sample() -> Conversation {
        let mut conv = Conversation::new(AssistantId::new());
        conv.title = "Trip".into();
        let _ = conv.append_message(Message::user("hi"));
        let mut reply = Message::assistant("hello");
        reply.model_id = Some("gpt-x".into());
        reply.usage = Some(TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 5,
            cached_tokens: 0,
        });
        let _ = conv.append_message(reply);
        conv
    }

    #[test]
    fn snapshot_maps_every_field() {
        let conv = sample();
        let dto = build_snapshot(&conv, true);
        assert_eq!(dto.id, conv.id);
        assert_eq!(dto.assistant_id, conv.assistant_id);
        assert_eq!(dto.title, "Trip");
        assert_eq!(dto.messages.len(), 2);
        assert_eq!(dto.messages[1].id, conv.nodes[1].id);
        assert_eq!(dto.messages[1].messages[0].model_id.as_deref(), Some("gpt-x"));
        assert_eq!(dto.truncate_index, -1);
        assert_eq!(dto.create_at, conv.create_at.timestamp_millis());
        assert!(dto.is_generating);
    }

    #[test]
    fn truncate_index_maps_through() {
        let mut conv = sample();
        conv.truncate_index = Some(1);
        assert_eq!(build_snapshot(&conv, false).truncate_index, 1);
    }

    #[test]
    fn snapshot_equality_is_structural() {
        let conv = sample();
        assert_eq!(build_snapshot(&conv, false), build_snapshot(&conv, false));
        assert_ne!(build_snapshot(&conv, false), build_snapshot(&conv, true));
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let v = serde_json::to_value(build_snapshot(&sample(), false)).unwrap();
        for key in [
            "id",
            "assistantId",
            "title",
            "messages",
            "truncateIndex",
            "chatSuggestions",
            "isPinned",
            "createAt",
            "updateAt",
            "isGenerating",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        let message = &v["messages"][1]["messages"][0];
        assert_eq!(message["role"], "ASSISTANT");
        assert!(message["createdAt"].is_i64());
        assert!(message.get("finishedAt").is_none());
        assert_eq!(v["messages"][0]["selectIndex"], Value::from(0));
    }

    #[test]
    fn list_item_omits_messages() {
        let conv = sample();
        let item = build_list_item(&conv, false);
        assert_eq!(item.title, "Trip");
        let v = serde_json::to_value(&item).unwrap();
        assert!(v.get("messages").is_none());
        assert_eq!(v["isGenerating"], false);
    }
}
