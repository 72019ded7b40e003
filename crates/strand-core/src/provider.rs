//! Streaming model provider.
//!
//! [`OllamaProvider`] drives one conversation turn against a local Ollama
//! server: it serializes the context and tool catalogue into the `/api/chat`
//! wire shape, opens a streaming request, and feeds the newline-delimited
//! response through the [`FrameDecoder`](crate::frame::FrameDecoder) and the
//! [`ThinkTagParser`](crate::tag::ThinkTagParser), yielding a lazy, finite
//! sequence of [`ProviderEvent`]s.
//!
//! Dropping the event stream drops the underlying response, which aborts the
//! backend request — that is the cancellation path, no out-of-band signal.

use std::pin::Pin;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::frame::{ChatFrame, FrameDecoder, RawToolCall};
use crate::tag::ThinkTagParser;
use crate::types::{Message, ProviderEvent, Role, ToolCall, ToolDefinition};

/// A lazy, finite, non-restartable sequence of provider events.
///
/// Transport failures mid-stream surface as an `Err` item; nothing follows
/// it.
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// A model backend capable of streaming one turn at a time.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open one model turn for the given context and tool catalogue.
    ///
    /// # Errors
    ///
    /// Fails before yielding any event if the request cannot be opened or
    /// the backend answers with a non-success status.
    async fn open_turn(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<ProviderEventStream>;
}

// ---------------------------------------------------------------------------
// Ollama provider
// ---------------------------------------------------------------------------

/// Provider implementation for the Ollama `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the given base URL (e.g.
    /// `http://127.0.0.1:11434`).
    ///
    /// The HTTP client carries no overall timeout: turns are unbounded and
    /// cancellation comes from dropping the event stream.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    /// The configured backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON body for `/api/chat`.
    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Value {
        let mut body = json!({
            "model": model,
            "messages": wire_messages(messages),
            "stream": true,
        });

        if !tools.is_empty() {
            body["tools"] = build_tools_payload(tools);
        }

        body
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn open_turn(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<ProviderEventStream> {
        let body = self.build_request_body(messages, tools, model);
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!(
            url = %url,
            model = %model,
            message_count = messages.len(),
            tool_count = tools.len(),
            "opening model turn"
        );

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Transport {
                reason: format!("request to {url} failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let stream = try_stream! {
            let mut body = resp.bytes_stream();
            let mut decoder = FrameDecoder::new();
            let mut turn = TurnState::new();

            while !turn.finished {
                match body.next().await {
                    Some(chunk) => {
                        let chunk = chunk.map_err(|e| AgentError::Transport {
                            reason: format!("backend read failed: {e}"),
                        })?;
                        for frame in decoder.push(&chunk)? {
                            for event in turn.apply(frame) {
                                yield event;
                            }
                            if turn.finished {
                                break;
                            }
                        }
                    }
                    None => {
                        // Clean end of body without a terminal frame: flush
                        // trailing bytes, then whatever the parsers held.
                        if let Some(frame) = decoder.finish()? {
                            for event in turn.apply(frame) {
                                yield event;
                            }
                        }
                        if !turn.finished {
                            for event in turn.end_of_stream() {
                                yield event;
                            }
                        }
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Per-turn frame processing
// ---------------------------------------------------------------------------

/// Accumulates one turn's worth of frames into provider events.
struct TurnState {
    tags: ThinkTagParser,
    pending_calls: Vec<ToolCall>,
    finished: bool,
}

impl TurnState {
    fn new() -> Self {
        Self {
            tags: ThinkTagParser::new(),
            pending_calls: Vec::new(),
            finished: false,
        }
    }

    /// Apply one frame, returning the events it completes in order.
    fn apply(&mut self, frame: ChatFrame) -> Vec<ProviderEvent> {
        let mut out = Vec::new();

        if let Some(message) = frame.message {
            for raw in message.tool_calls {
                self.pending_calls.push(normalize_tool_call(raw));
            }
            if let Some(content) = message.content
                && !content.is_empty()
            {
                out.extend(self.tags.push(&content));
            }
        }

        if frame.done {
            self.finished = true;
            out.extend(self.tags.finish());
            if !self.pending_calls.is_empty() {
                out.push(ProviderEvent::ToolCalls {
                    calls: std::mem::take(&mut self.pending_calls),
                });
            }
        }

        out
    }

    /// The body ended without a terminal frame; emit what remains.
    fn end_of_stream(&mut self) -> Vec<ProviderEvent> {
        self.finished = true;
        let mut out = self.tags.finish();
        if !self.pending_calls.is_empty() {
            out.push(ProviderEvent::ToolCalls {
                calls: std::mem::take(&mut self.pending_calls),
            });
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Wire serialization
// ---------------------------------------------------------------------------

/// Convert the conversation context into the `/api/chat` message array.
pub(crate) fn wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .enumerate()
        .map(|(index, msg)| match msg.role {
            Role::System | Role::User => json!({
                "role": msg.role.as_str(),
                "content": msg.content_text(),
            }),
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    json!({
                        "role": "assistant",
                        "content": msg.content_text(),
                    })
                } else {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "function": {
                                    "name": call.name,
                                    "arguments": arguments_value(&call.arguments),
                                }
                            })
                        })
                        .collect();
                    json!({
                        "role": "assistant",
                        "content": msg.content_text(),
                        "tool_calls": calls,
                    })
                }
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_name": resolve_tool_name(messages, index, msg.tool_call_id.as_deref()),
                "content": msg.content_text(),
            }),
        })
        .collect()
}

/// Serialize the tool catalogue into the backend's `tools` array.
fn build_tools_payload(tools: &[ToolDefinition]) -> Value {
    let values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                },
            })
        })
        .collect();
    json!(values)
}

/// Canonical arguments string back to wire form: object if it parses,
/// otherwise passed through as a string.
fn arguments_value(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_owned()))
}

/// Resolve the name of the tool that produced a tool-role message by
/// scanning backward for the assistant message owning the call id.  Falls
/// back to the id itself.
fn resolve_tool_name(messages: &[Message], index: usize, call_id: Option<&str>) -> String {
    let Some(call_id) = call_id else {
        return String::new();
    };
    messages[..index]
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| m.tool_calls.iter())
        .find(|c| c.id == call_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| call_id.to_owned())
}

/// Normalize a wire tool call: arguments become canonical JSON text and a
/// missing id gets a fresh unique one.
fn normalize_tool_call(raw: RawToolCall) -> ToolCall {
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("call_{}", Uuid::now_v7()));

    let arguments = match raw.function.arguments {
        Some(Value::String(s)) => s,
        Some(value) => value.to_string(),
        None => "{}".to_owned(),
    };

    ToolCall {
        id,
        name: raw.function.name,
        arguments,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFunction;

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn request_body_basic() {
        let provider = OllamaProvider::new("http://127.0.0.1:11434/");
        assert_eq!(provider.base_url(), "http://127.0.0.1:11434");

        let body = provider.build_request_body(&[Message::user("Hi")], &[], "qwen3");
        assert_eq!(body["model"], "qwen3");
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hi");
    }

    #[test]
    fn request_body_with_tools() {
        let provider = OllamaProvider::new("http://127.0.0.1:11434");
        let tools = vec![ToolDefinition {
            name: "read_file".into(),
            description: "Read a file".into(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        }];

        let body = provider.build_request_body(&[Message::user("go")], &tools, "qwen3");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"][0],
            "path"
        );
    }

    #[test]
    fn wire_tool_message_resolves_name_from_owning_call() {
        let messages = vec![
            Message::user("ls please"),
            Message::assistant_tool_calls(vec![call("call_1", "run_command", r#"{"command":"ls"}"#)]),
            Message::tool_result("call_1", "file1"),
        ];

        let wire = wire_messages(&messages);
        assert_eq!(wire[1]["role"], "assistant");
        assert_eq!(wire[1]["tool_calls"][0]["function"]["name"], "run_command");
        // Arguments are re-expanded to object form on the wire.
        assert_eq!(
            wire[1]["tool_calls"][0]["function"]["arguments"]["command"],
            "ls"
        );
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[2]["tool_name"], "run_command");
        assert_eq!(wire[2]["content"], "file1");
    }

    #[test]
    fn wire_tool_message_falls_back_to_call_id() {
        let messages = vec![Message::tool_result("call_x", "orphaned")];
        let wire = wire_messages(&messages);
        assert_eq!(wire[0]["tool_name"], "call_x");
    }

    #[test]
    fn wire_round_trip_recovers_call_triples() {
        let original = call("call_7", "write_file", r#"{"path":"out.txt","content":"x"}"#);
        let messages = vec![
            Message::assistant_tool_calls(vec![original.clone()]),
            Message::tool_result("call_7", "4 bytes written"),
        ];

        let wire = wire_messages(&messages);
        let function = &wire[0]["tool_calls"][0]["function"];
        let recovered = normalize_tool_call(RawToolCall {
            id: Some(original.id.clone()),
            function: RawFunction {
                name: function["name"].as_str().unwrap().to_owned(),
                arguments: Some(function["arguments"].clone()),
            },
        });

        assert_eq!(recovered.id, original.id);
        assert_eq!(recovered.name, original.name);
        assert_eq!(
            serde_json::from_str::<Value>(&recovered.arguments).unwrap(),
            serde_json::from_str::<Value>(&original.arguments).unwrap(),
        );
    }

    #[test]
    fn normalize_synthesizes_unique_ids() {
        let raw = || RawToolCall {
            id: None,
            function: RawFunction {
                name: "run_command".into(),
                arguments: None,
            },
        };

        let a = normalize_tool_call(raw());
        let b = normalize_tool_call(raw());
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.arguments, "{}");
    }

    #[test]
    fn normalize_keeps_string_arguments_verbatim() {
        let normalized = normalize_tool_call(RawToolCall {
            id: Some("call_1".into()),
            function: RawFunction {
                name: "run_command".into(),
                arguments: Some(Value::String(r#"{"command":"ls"}"#.into())),
            },
        });
        assert_eq!(normalized.arguments, r#"{"command":"ls"}"#);
    }

    #[test]
    fn normalize_serializes_object_arguments() {
        let normalized = normalize_tool_call(RawToolCall {
            id: Some("call_1".into()),
            function: RawFunction {
                name: "run_command".into(),
                arguments: Some(json!({"command": "ls"})),
            },
        });
        assert_eq!(normalized.arguments, r#"{"command":"ls"}"#);
    }

    #[test]
    fn turn_state_orders_flush_before_tool_batch() {
        let mut turn = TurnState::new();

        let events = turn.apply(ChatFrame {
            message: Some(crate::frame::FrameMessage {
                role: Some("assistant".into()),
                content: Some("working".into()),
                tool_calls: vec![],
            }),
            done: false,
        });
        assert_eq!(
            events,
            vec![ProviderEvent::TextDelta {
                content: "working".into()
            }]
        );

        let events = turn.apply(ChatFrame {
            message: Some(crate::frame::FrameMessage {
                role: Some("assistant".into()),
                content: None,
                tool_calls: vec![RawToolCall {
                    id: None,
                    function: RawFunction {
                        name: "run_command".into(),
                        arguments: Some(json!({"command": "ls"})),
                    },
                }],
            }),
            done: true,
        });
        assert!(turn.finished);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ProviderEvent::ToolCalls { calls } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "run_command");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
