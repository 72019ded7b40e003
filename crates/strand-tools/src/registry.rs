//! Tool registry.
//!
//! [`BuiltinRegistry`] collects [`Tool`] implementations and exposes them to
//! the loop through the [`strand_core::ToolRegistry`] capability: a flat
//! catalogue plus dispatch-by-name with the argument payload arriving as
//! canonical JSON text.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use strand_core::{AgentError, ToolDefinition, ToolRegistry};

/// A single executable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute with parsed JSON arguments, returning the result string fed
    /// back to the model.
    async fn execute(&self, params: Value) -> Result<String>;
}

/// Registry over the built-in tool set.
#[derive(Default)]
pub struct BuiltinRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl BuiltinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the standard tool set (shell runner, file
    /// read, file write), all scoped under `workspace_root`.
    pub fn with_defaults(workspace_root: impl Into<std::path::PathBuf>) -> Self {
        let root = workspace_root.into();
        let mut registry = Self::new();
        registry.register(Arc::new(crate::shell::CommandTool::new(root.clone())));
        registry.register(Arc::new(crate::fs::ReadFileTool::new(root.clone())));
        registry.register(Arc::new(crate::fs::WriteFileTool::new(root)));
        registry
    }

    /// Add a tool.  Last registration wins on name collisions, matching
    /// dispatch order.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .rev()
            .find(|t| t.definition().name == name)
    }
}

#[async_trait]
impl ToolRegistry for BuiltinRegistry {
    fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn execute(&self, name: &str, arguments: &str) -> strand_core::Result<String> {
        let tool = self.find(name).ok_or_else(|| AgentError::UnknownTool {
            tool_name: name.to_owned(),
        })?;

        let params: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|e| AgentError::Tool {
                tool_name: name.to_owned(),
                reason: format!("arguments are not valid JSON: {e}"),
            })?
        };

        tool.execute(params).await.map_err(|e| AgentError::Tool {
            tool_name: name.to_owned(),
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "Echoes its arguments".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn execute(&self, params: Value) -> Result<String> {
            Ok(params.to_string())
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry.execute("echo", r#"{"x":1}"#).await.unwrap();
        assert_eq!(result, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = BuiltinRegistry::new();
        let err = registry.execute("nope", "{}").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown tool: nope");
    }

    #[tokio::test]
    async fn invalid_argument_json_is_an_error() {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(EchoTool));

        let err = registry.execute("echo", "{broken").await.unwrap_err();
        assert!(matches!(err, AgentError::Tool { .. }));
    }

    #[tokio::test]
    async fn empty_arguments_become_an_empty_object() {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry.execute("echo", "").await.unwrap();
        assert_eq!(result, "{}");
    }

    #[test]
    fn default_set_lists_three_tools() {
        let registry = BuiltinRegistry::with_defaults("/tmp");
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["run_command", "read_file", "write_file"]);
    }
}
