//! Tool error types.

use thiserror::Error;

/// Errors surfaced by built-in tools.
///
/// Note that the loop never aborts on these: the registry bridge converts
/// them into `Error:` result strings fed back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not match the tool's schema.
    #[error("invalid parameters for `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// The tool ran but failed.
    #[error("`{tool_name}` failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    /// The tool exceeded its time limit.
    #[error("timed out after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the tools crate.
pub type Result<T> = std::result::Result<T, ToolError>;
