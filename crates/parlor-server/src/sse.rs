//! Rendering of stream items as server-sent events.
//!
//! The SSE `event:` name is the payload's `type`; sequenced events also set
//! `id:` to their sequence number. Heartbeats are comment lines.

use axum::response::sse::Event;
use parlor_stream::{ConversationEvent, ConversationListEvent, StreamItem};
use serde::Serialize;
use tracing::warn;

/// Comment text of a heartbeat.
pub const HEARTBEAT_COMMENT: &str = "heartbeat";

/// SSE frame for a publisher item.
pub fn render_item(item: &StreamItem) -> Event {
    match item {
        StreamItem::Heartbeat => Event::default().comment(HEARTBEAT_COMMENT),
        StreamItem::Event(event) => render_conversation_event(event),
    }
}

/// SSE frame for a conversation event.
pub fn render_conversation_event(event: &ConversationEvent) -> Event {
    let mut frame = Event::default().event(event.event_type());
    if let Some(seq) = event.seq() {
        frame = frame.id(seq.to_string());
    }
    with_json(frame, event)
}

/// SSE frame for a conversation list event.
pub fn render_list_event(event: &ConversationListEvent) -> Event {
    with_json(Event::default().event(event.event_type()), event)
}

fn with_json(frame: Event, payload: &impl Serialize) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => frame.data(json),
        Err(e) => {
            warn!(error = %e, "failed to serialize stream event");
            Event::default().comment("unserializable event dropped")
        }
    }
}
