//! HTTP routes.

pub mod context;
pub mod conversations;

use axum::Router;
use axum::routing::{delete, get, post, put};
use parlor_core::ids::ConversationId;

use crate::error::ApiError;
use crate::server::AppState;

/// Every `/api` route.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/conversations",
            get(conversations::list).post(conversations::create),
        )
        .route("/api/conversations/stream", get(conversations::list_stream))
        .route(
            "/api/conversations/{id}",
            get(conversations::get_one).delete(conversations::remove),
        )
        .route("/api/conversations/{id}/stream", get(conversations::stream))
        .route("/api/conversations/{id}/resync", post(conversations::resync))
        .route("/api/conversations/{id}/messages", post(conversations::append_message))
        .route("/api/conversations/{id}/generating", put(conversations::set_generating))
        .route("/api/conversations/{id}/errors", post(conversations::report_error))
        .route("/api/conversations/{id}/context", post(context::conversation_context))
        .route("/api/errors/{id}", delete(conversations::dismiss_error))
        .route("/api/context/transform", post(context::transform))
}

pub(crate) fn parse_conversation_id(raw: &str) -> Result<ConversationId, ApiError> {
    Ok(ConversationId::parse(raw)?)
}
