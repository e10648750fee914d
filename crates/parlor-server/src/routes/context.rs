//! Context assembly endpoints.

use std::borrow::Cow;

use axum::Json;
use axum::extract::{Path, State};
use parlor_context::{Assistant, InjectionCatalog};
use parlor_core::messages::Message;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::parse_conversation_id;
use crate::error::ApiError;
use crate::server::AppState;

/// Body of `POST /api/context/transform`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Outgoing messages, in order.
    pub messages: Vec<Message>,
    /// Assistant whose links select the injections.
    pub assistant: Assistant,
    /// Available injection definitions.
    #[serde(default)]
    pub catalog: InjectionCatalog,
}

/// Body of `POST /api/conversations/{id}/context`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContextRequest {
    /// Assistant whose links select the injections.
    pub assistant: Assistant,
    /// Available injection definitions.
    #[serde(default)]
    pub catalog: InjectionCatalog,
}

/// Transformed message list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    /// Messages to send to the model.
    pub messages: Vec<Message>,
    /// Whether any injection changed the list.
    pub transformed: bool,
}

/// `POST /api/context/transform`
#[instrument(skip_all, fields(assistant_id = %req.assistant.id))]
pub async fn transform(
    State(state): State<AppState>,
    Json(req): Json<TransformRequest>,
) -> Json<TransformResponse> {
    let out = state
        .assembler
        .assemble(&req.messages, &req.assistant, &req.catalog);
    let transformed = matches!(out, Cow::Owned(_));
    Json(TransformResponse {
        messages: out.into_owned(),
        transformed,
    })
}

/// `POST /api/conversations/{id}/context`
///
/// Assembles the context view of a stored conversation, starting at its
/// truncation point.
#[instrument(skip_all, fields(conversation_id = %raw))]
pub async fn conversation_context(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(req): Json<ConversationContextRequest>,
) -> Result<Json<TransformResponse>, ApiError> {
    let id = parse_conversation_id(&raw)?;
    let conversation = state
        .hub
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("conversation {id}")))?;
    let context = conversation.context_messages();
    let out = state
        .assembler
        .assemble(&context, &req.assistant, &req.catalog);
    let transformed = matches!(out, Cow::Owned(_));
    Ok(Json(TransformResponse {
        messages: out.into_owned(),
        transformed,
    }))
}
