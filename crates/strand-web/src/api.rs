//! REST API route handlers.
//!
//! Endpoints for system status, tool discovery, and conversation
//! management.  The streaming chat endpoint lives in [`crate::chat`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use strand_store::StoreError;

use crate::state::AppState;

/// Build a JSON error response.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Map a store failure onto an HTTP response.
fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound { entity, id } => error_response(
            StatusCode::NOT_FOUND,
            &format!("{entity} not found: {id}"),
        ),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub tool_count: usize,
}

/// Return basic system status information.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.loop_defaults.model.clone(),
        tool_count: state.registry.list().len(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/tools
// ---------------------------------------------------------------------------

/// Serializable summary of a single tool.
#[derive(Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// List all registered tools.
pub async fn tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    let infos: Vec<ToolInfo> = state
        .registry
        .list()
        .into_iter()
        .map(|t| ToolInfo {
            name: t.name,
            description: t.description,
            parameters: t.parameters,
        })
        .collect();

    Json(infos)
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// Pagination query for `GET /api/conversations`.
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// List conversations, most recently updated first.
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.conversations.list(query.limit, query.offset).await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Request body for `POST /api/conversations`.
#[derive(Deserialize, Default)]
pub struct CreateConversationBody {
    /// Model for the new conversation; the server default when absent.
    #[serde(default)]
    pub model: Option<String>,
}

/// Create a new conversation.
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateConversationBody>,
) -> Response {
    let model = body
        .model
        .unwrap_or_else(|| state.loop_defaults.model.clone());

    match state.conversations.create(&model).await {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Fetch a single conversation.
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.conversations.get(&id).await {
        Ok(conversation) => Json(conversation).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Delete a conversation and its messages.
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.conversations.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// Fetch a conversation's messages in insertion order.
pub async fn get_conversation_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    // Resolve the conversation first so an unknown id is a 404 rather than
    // an empty list.
    if let Err(e) = state.conversations.get(&id).await {
        return store_error_response(e);
    }
    match state.conversations.messages(&id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => store_error_response(e),
    }
}
