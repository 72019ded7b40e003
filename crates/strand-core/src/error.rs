//! Core error types.
//!
//! Every subsystem in the inference pipeline surfaces failures through
//! [`AgentError`].  The loop converts whatever reaches it into a single
//! terminal `error` event, so variant messages are written to be shown to a
//! consumer as-is.

use thiserror::Error;

/// Unified error type for the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    // -- Input errors --------------------------------------------------------
    /// Bad input from the caller (empty messages, invalid role, bad limits).
    #[error("{reason}")]
    Validation { reason: String },

    // -- Backend errors ------------------------------------------------------
    /// The model backend answered with a non-success HTTP status.
    #[error("Ollama request failed: {status} - {body}")]
    Backend { status: u16, body: String },

    /// The connection to the model backend failed while a stream was in
    /// flight (or could not be established at all).
    #[error("stream transport error: {reason}")]
    Transport { reason: String },

    /// A wire frame from the backend could not be decoded.
    #[error("malformed backend frame: {reason}")]
    Frame { reason: String },

    /// The backend violated the provider contract (e.g. an explicitly empty
    /// tool-calls batch).
    #[error("{reason}")]
    Protocol { reason: String },

    // -- Loop errors ---------------------------------------------------------
    /// The loop hit its iteration bound without producing a final answer.
    #[error("Max iterations reached")]
    IterationLimit { max_iterations: u32 },

    // -- Tool errors ---------------------------------------------------------
    /// A tool call referenced a tool that is not registered.
    ///
    /// Never aborts the loop: the message is fed back to the model as an
    /// `Error:` result string.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.  Same recovery discipline as
    /// [`AgentError::UnknownTool`].
    #[error("tool `{tool_name}` failed: {reason}")]
    Tool { tool_name: String, reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            reason: err.to_string(),
        }
    }
}
