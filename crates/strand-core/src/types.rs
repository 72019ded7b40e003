//! Core types for the inference loop.
//!
//! These types model the data flowing through the pipeline: conversation
//! messages going in, provider events coming out of a single model turn, and
//! loop events delivered to the consumer.  They are backend-agnostic at this
//! layer; the [`crate::provider`] module translates them into the Ollama wire
//! format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the model.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

impl Role {
    /// Lowercase wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parse a lowercase role name.  Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// `None` on assistant messages that carry only tool calls.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the assistant (only present when
    /// `role == Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message is a response to
    /// (only present when `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message that carries tool calls and no text.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// The text content, or `""` for messages without one.
    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier within the conversation.  Synthesized by the
    /// provider when the backend does not supply one.
    pub id: String,

    /// The name of the tool to invoke (must match a registered tool).
    pub name: String,

    /// Argument payload as canonical JSON-object text.
    pub arguments: String,
}

/// A tool definition exposed to the model so it knows what it may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's input parameters.
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// Provider events
// ---------------------------------------------------------------------------

/// One event from a single model turn.
///
/// A turn's event stream is a sequence of [`ProviderEvent::Thinking`] and
/// [`ProviderEvent::TextDelta`] deltas, optionally terminated by one
/// [`ProviderEvent::ToolCalls`] batch.  Nothing follows the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A delta of hidden reasoning text.
    Thinking { content: String },

    /// A delta of user-visible text.
    TextDelta { content: String },

    /// A terminal batch of tool calls that ends the turn.
    ToolCalls { calls: Vec<ToolCall> },
}

// ---------------------------------------------------------------------------
// Loop events
// ---------------------------------------------------------------------------

/// One event on the consumer-facing loop stream.
///
/// Serialized with a `type` discriminator, which is also the wire shape the
/// SSE adapter sends.  The final event on every path is [`LoopEvent::Done`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// One-shot event identifying the persistent conversation.  Emitted by
    /// the request handler before the first model event.
    Conversation { id: String },

    /// Hidden reasoning delta, forwarded from the provider.
    Thinking { content: String },

    /// Visible text delta, forwarded from the provider.
    TextDelta { content: String },

    /// A tool invocation is about to run.
    ToolCall { call: ToolCall },

    /// A tool invocation finished (successfully or not — failures are
    /// carried in the result string).
    ToolResult { call_id: String, result: String },

    /// Compatibility terminal event carrying the fully accumulated visible
    /// text of the final turn.  Consumers that accumulate deltas can ignore
    /// it.
    Text { content: String },

    /// Terminal failure event.  Always followed by [`LoopEvent::Done`].
    Error { message: String },

    /// Terminal success marker, always the last event on any path.
    Done,
}

// ---------------------------------------------------------------------------
// Loop configuration
// ---------------------------------------------------------------------------

/// Configuration for one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum number of model turns before the loop gives up.  Must be
    /// strictly positive.
    pub max_iterations: u32,

    /// Model identifier passed to the backend.
    pub model: String,

    /// Optional system prompt prepended to the conversation context.
    pub system_prompt: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model: String::new(),
            system_prompt: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
