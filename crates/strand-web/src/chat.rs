//! Streaming chat endpoint.
//!
//! `POST /api/chat` resolves (or creates) the conversation, persists the
//! user message, replays stored history into a loop context, and streams
//! the loop's events back as SSE — persisting assistant output and tool
//! results as they pass through.

use std::sync::Arc;

use async_stream::stream;
use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use strand_core::{LoopConfig, LoopEvent, Message, Role, run_loop};
use strand_store::{ConversationStore, StoreError, StoredMessage};

use crate::api::error_response;
use crate::sse::sse_response;
use crate::state::AppState;

/// Request body for the streaming chat endpoint.
#[derive(Deserialize)]
pub struct ChatBody {
    /// The user message to send to the agent.
    pub message: String,

    /// Continue an existing conversation, or start a new one when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Per-request model override.
    #[serde(default)]
    pub model: Option<String>,
}

/// Run the streaming chat flow.
pub async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatBody>) -> Response {
    if body.message.trim().is_empty() {
        return error_response(axum::http::StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let model = body
        .model
        .clone()
        .unwrap_or_else(|| state.loop_defaults.model.clone());

    // Resolve the conversation before opening any stream so an unknown id
    // is a plain 404, not a mid-stream error.
    let conversation = match &body.conversation_id {
        Some(id) => match state.conversations.get(id).await {
            Ok(conversation) => conversation,
            Err(StoreError::NotFound { .. }) => {
                return error_response(
                    axum::http::StatusCode::NOT_FOUND,
                    &format!("unknown conversation: {id}"),
                );
            }
            Err(e) => {
                return error_response(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    &e.to_string(),
                );
            }
        },
        None => match state.conversations.create(&model).await {
            Ok(conversation) => conversation,
            Err(e) => {
                return error_response(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    &e.to_string(),
                );
            }
        },
    };

    if let Err(e) = state
        .conversations
        .append_message(&conversation.id, "user", Some(&body.message), None, None)
        .await
    {
        return error_response(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            &e.to_string(),
        );
    }

    let history = match state.conversations.messages(&conversation.id).await {
        Ok(history) => history,
        Err(e) => {
            return error_response(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            );
        }
    };
    let messages = match context_from_history(&history) {
        Ok(messages) => messages,
        Err(reason) => {
            return error_response(axum::http::StatusCode::INTERNAL_SERVER_ERROR, &reason);
        }
    };

    let config = LoopConfig {
        max_iterations: state.loop_defaults.max_iterations,
        model,
        system_prompt: state.loop_defaults.system_prompt.clone(),
    };

    tracing::info!(
        conversation_id = %conversation.id,
        model = %config.model,
        history_len = messages.len(),
        "starting chat stream"
    );

    let events = run_loop(
        Arc::clone(&state.provider),
        Arc::clone(&state.registry),
        config,
        &messages,
    );
    let events = persist_events(state.conversations.clone(), conversation.id.clone(), events);

    let cancelled_conversation = conversation.id.clone();
    let on_cancel: crate::sse::CancelHook = Box::new(move || {
        tracing::info!(conversation_id = %cancelled_conversation, "consumer cancelled chat stream");
    });

    sse_response(events, Some(on_cancel)).into_response()
}

/// Prefix the stream with the `conversation` event and persist assistant
/// output and tool results as they stream past.
fn persist_events<S>(
    store: ConversationStore,
    conversation_id: String,
    events: S,
) -> impl Stream<Item = LoopEvent> + Send
where
    S: Stream<Item = LoopEvent> + Send + 'static,
{
    stream! {
        yield LoopEvent::Conversation { id: conversation_id.clone() };

        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            match &event {
                LoopEvent::Text { content } => {
                    if let Err(e) = store
                        .append_message(&conversation_id, "assistant", Some(content), None, None)
                        .await
                    {
                        tracing::warn!(error = %e, "failed to persist assistant message");
                    }
                }
                LoopEvent::ToolCall { call } => {
                    match serde_json::to_string(&[call.clone()]) {
                        Ok(calls_json) => {
                            if let Err(e) = store
                                .append_message(
                                    &conversation_id,
                                    "assistant",
                                    None,
                                    Some(&calls_json),
                                    None,
                                )
                                .await
                            {
                                tracing::warn!(error = %e, "failed to persist tool call");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to serialize tool call"),
                    }
                }
                LoopEvent::ToolResult { call_id, result } => {
                    if let Err(e) = store
                        .append_message(
                            &conversation_id,
                            "tool",
                            Some(result),
                            None,
                            Some(call_id),
                        )
                        .await
                    {
                        tracing::warn!(error = %e, "failed to persist tool result");
                    }
                }
                _ => {}
            }
            yield event;
        }
    }
}

/// Replay stored rows into a loop context.
pub(crate) fn context_from_history(history: &[StoredMessage]) -> Result<Vec<Message>, String> {
    let mut messages = Vec::with_capacity(history.len());

    for row in history {
        let role = Role::parse(&row.role)
            .ok_or_else(|| format!("invalid role in stored message: {}", row.role))?;

        let message = match role {
            Role::System => Message::system(row.content.clone().unwrap_or_default()),
            Role::User => Message::user(row.content.clone().unwrap_or_default()),
            Role::Assistant => match &row.tool_calls {
                Some(calls_json) => {
                    let calls = serde_json::from_str(calls_json)
                        .map_err(|e| format!("invalid stored tool calls: {e}"))?;
                    Message::assistant_tool_calls(calls)
                }
                None => Message::assistant(row.content.clone().unwrap_or_default()),
            },
            Role::Tool => Message::tool_result(
                row.tool_call_id.clone().unwrap_or_default(),
                row.content.clone().unwrap_or_default(),
            ),
        };
        messages.push(message);
    }

    Ok(messages)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
