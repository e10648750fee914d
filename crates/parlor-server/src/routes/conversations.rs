//! Conversation endpoints and their live streams.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::{Stream, StreamExt};
use parlor_core::ids::{AssistantId, ConversationId, ErrorId, MessageId, NodeId};
use parlor_core::messages::{Message, MessagePart, MessageRole};
use parlor_core::Conversation;
use parlor_stream::{
    ConversationChange, ConversationDto, ConversationListDto, ConversationListEvent, build_snapshot,
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, instrument};

use super::parse_conversation_id;
use crate::error::ApiError;
use crate::server::AppState;
use crate::sse;

// ─── Request / response bodies ──────────────────────────────────────────────

/// Query of the list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Restrict to one assistant.
    pub assistant_id: Option<String>,
}

impl ListQuery {
    fn assistant(&self) -> Result<Option<AssistantId>, ApiError> {
        Ok(self
            .assistant_id
            .as_deref()
            .map(AssistantId::parse)
            .transpose()?)
    }
}

/// Body of `POST /api/conversations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Owning assistant.
    pub assistant_id: String,
    /// Initial title.
    #[serde(default)]
    pub title: String,
}

/// Body of `POST /api/conversations/{id}/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    /// Author role.
    pub role: MessageRole,
    /// Text content.
    pub text: String,
}

/// Ids of an appended message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageResponse {
    /// New node.
    pub node_id: NodeId,
    /// New message.
    pub message_id: MessageId,
}

/// Body of `PUT /api/conversations/{id}/generating`.
#[derive(Debug, Deserialize)]
pub struct GeneratingRequest {
    /// New flag value.
    pub generating: bool,
}

/// Result of a generation flag update.
#[derive(Debug, Serialize)]
pub struct GeneratingResponse {
    /// Whether the flag changed.
    pub changed: bool,
}

/// Body of `POST /api/conversations/{id}/errors`.
#[derive(Debug, Deserialize)]
pub struct ReportErrorRequest {
    /// Failure kind.
    #[serde(default = "default_error_kind")]
    pub kind: String,
    /// Error text.
    #[serde(default)]
    pub message: String,
}

fn default_error_kind() -> String {
    "generation".to_string()
}

/// Id of a reported error.
#[derive(Debug, Serialize)]
pub struct ReportErrorResponse {
    /// Error id.
    pub id: ErrorId,
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// `GET /api/conversations`
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConversationListDto>>, ApiError> {
    let assistant = query.assistant()?;
    Ok(Json(state.hub.list(assistant.as_ref())))
}

/// `POST /api/conversations`
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDto>), ApiError> {
    let assistant_id = AssistantId::parse(&req.assistant_id)?;
    let mut conversation = Conversation::new(assistant_id);
    conversation.title = req.title;
    let dto = build_snapshot(&conversation, false);
    info!(conversation_id = %conversation.id, "conversation created");
    state.hub.insert(conversation);
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `GET /api/conversations/{id}`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn get_one(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ConversationDto>, ApiError> {
    let id = parse_conversation_id(&raw)?;
    let conversation = state
        .hub
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("conversation {id}")))?;
    Ok(Json(build_snapshot(&conversation, state.hub.is_generating(&id))))
}

/// `DELETE /api/conversations/{id}`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn remove(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_conversation_id(&raw)?;
    state.hub.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/conversations/{id}/messages`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn append_message(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<AppendMessageResponse>, ApiError> {
    let id = parse_conversation_id(&raw)?;
    let message = Message::new(req.role, vec![MessagePart::text(req.text)]);
    let message_id = message.id.clone();
    let node_id = state.hub.update(&id, |c| c.append_message(message))?;
    Ok(Json(AppendMessageResponse {
        node_id,
        message_id,
    }))
}

/// `PUT /api/conversations/{id}/generating`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn set_generating(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(req): Json<GeneratingRequest>,
) -> Result<Json<GeneratingResponse>, ApiError> {
    let id = parse_conversation_id(&raw)?;
    let changed = state.hub.set_generating(&id, req.generating)?;
    Ok(Json(GeneratingResponse { changed }))
}

/// `POST /api/conversations/{id}/errors`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn report_error(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(req): Json<ReportErrorRequest>,
) -> Result<(StatusCode, Json<ReportErrorResponse>), ApiError> {
    let id = parse_conversation_id(&raw)?;
    if !state.hub.contains(&id) {
        return Err(ApiError::NotFound(format!("conversation {id}")));
    }
    let error_id = state.hub.report_error(&id, req.kind, req.message);
    Ok((StatusCode::CREATED, Json(ReportErrorResponse { id: error_id })))
}

/// `DELETE /api/errors/{id}`
#[instrument(skip_all, fields(error_id = %raw))]
pub async fn dismiss_error(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = ErrorId::parse(&raw)?;
    if state.hub.dismiss_error(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("error {id}")))
    }
}

/// `POST /api/conversations/{id}/resync`
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn resync(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_conversation_id(&raw)?;
    state.hub.request_resync(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/conversations/{id}/stream`
///
/// One publisher session per request. Disconnecting drops the subscription,
/// which ends the session and releases the conversation reference.
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn stream(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = parse_conversation_id(&raw)?;
    let subscription = state.publisher.subscribe(&id)?;
    info!(subscribers = state.hub.ref_count(&id), "conversation stream opened");

    let events = futures::stream::unfold(subscription, |mut sub| async move {
        let item = sub.recv().await?;
        Some((Ok(sse::render_item(&item)), sub))
    });
    Ok(Sse::new(events))
}

/// `GET /api/conversations/stream`
///
/// Emits `invalidate` whenever a conversation of the (optionally filtered)
/// assistant changes. Ends on shutdown.
#[instrument(skip_all)]
pub async fn list_stream(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = query.assistant()?;
    let changes = BroadcastStream::new(state.hub.subscribe_changes());
    let events = changes
        .filter_map(move |change| {
            let event = invalidation(change, filter.as_ref());
            async move { event.map(|e| Ok(sse::render_list_event(&e))) }
        })
        .take_until(state.shutdown.clone().cancelled_owned());
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.list_heartbeat_interval)))
}

/// Invalidation for a change notification, if it passes the filter.
///
/// After a lag the affected assistants are unknown; a filtered stream
/// invalidates its own assistant, an unfiltered one waits for the next change.
fn invalidation(
    change: Result<ConversationChange, BroadcastStreamRecvError>,
    filter: Option<&AssistantId>,
) -> Option<ConversationListEvent> {
    let assistant_id = match change {
        Ok(change) => change.assistant_id,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "conversation list stream lagged");
            filter?.clone()
        }
    };
    if filter.is_some_and(|f| f != &assistant_id) {
        return None;
    }
    Some(ConversationListEvent::Invalidate {
        assistant_id,
        timestamp: Utc::now().timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parlor_stream::ChangeKind;

    fn change(assistant_id: &AssistantId) -> ConversationChange {
        ConversationChange {
            conversation_id: ConversationId::new(),
            assistant_id: assistant_id.clone(),
            kind: ChangeKind::Updated,
        }
    }

    #[test]
    fn invalidation_respects_filter() {
        let mine = AssistantId::new();
        let other = AssistantId::new();
        assert_matches!(
            invalidation(Ok(change(&mine)), Some(&mine)),
            Some(ConversationListEvent::Invalidate { ref assistant_id, .. }) if assistant_id == &mine
        );
        assert!(invalidation(Ok(change(&other)), Some(&mine)).is_none());
        assert!(invalidation(Ok(change(&other)), None).is_some());
    }

    #[test]
    fn lag_invalidates_filtered_assistant_only() {
        let mine = AssistantId::new();
        assert_matches!(
            invalidation(Err(BroadcastStreamRecvError::Lagged(3)), Some(&mine)),
            Some(ConversationListEvent::Invalidate { ref assistant_id, .. }) if assistant_id == &mine
        );
        assert!(invalidation(Err(BroadcastStreamRecvError::Lagged(3)), None).is_none());
    }
}
