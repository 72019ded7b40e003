//! File tools — read and write files scoped under a workspace root.
//!
//! Paths supplied by the model are resolved relative to the configured root;
//! parent-directory traversal and absolute paths outside the root are
//! rejected before any I/O happens.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::registry::Tool;
use strand_core::ToolDefinition;

/// Maximum file size `read_file` will return (256 KB).
const MAX_READ_BYTES: u64 = 256 * 1024;

/// Resolve a model-supplied path against the workspace root.
///
/// Rejects `..` components and absolute paths that do not already live under
/// the root.
fn resolve_scoped(root: &Path, tool_name: &str, raw: &str) -> Result<PathBuf> {
    let requested = Path::new(raw);

    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::InvalidParams {
            tool_name: tool_name.into(),
            reason: format!("path `{raw}` must not contain `..`"),
        });
    }

    if requested.is_absolute() {
        if requested.starts_with(root) {
            return Ok(requested.to_path_buf());
        }
        return Err(ToolError::InvalidParams {
            tool_name: tool_name.into(),
            reason: format!("absolute path `{raw}` is outside the workspace root"),
        });
    }

    Ok(root.join(requested))
}

/// Extract the required `path` string field.
fn path_param<'a>(params: &'a Value, tool_name: &str) -> Result<&'a str> {
    params
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParams {
            tool_name: tool_name.into(),
            reason: "missing required string field `path`".into(),
        })
}

// ---------------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------------

/// The `read_file` tool.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    /// Create a read tool scoped under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a UTF-8 text file and return its contents".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the workspace root"
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let raw = path_param(&params, "read_file")?;
        let path = resolve_scoped(&self.root, "read_file", raw)?;

        debug!(path = %path.display(), "reading file");

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("cannot stat `{raw}`: {e}"),
            })?;
        if metadata.len() > MAX_READ_BYTES {
            return Err(ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!(
                    "`{raw}` is {} bytes, over the {MAX_READ_BYTES} byte limit",
                    metadata.len()
                ),
            });
        }

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("cannot read `{raw}`: {e}"),
            })
    }
}

// ---------------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------------

/// The `write_file` tool.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    /// Create a write tool scoped under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".into(),
            description: "Create or overwrite a UTF-8 text file with the given content".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the workspace root"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full file content to write"
                    }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let raw = path_param(&params, "write_file")?;
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParams {
                tool_name: "write_file".into(),
                reason: "missing required string field `content`".into(),
            })?;

        let path = resolve_scoped(&self.root, "write_file", raw)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "write_file".into(),
                    reason: format!("cannot create parent directories for `{raw}`: {e}"),
                })?;
        }

        debug!(path = %path.display(), bytes = content.len(), "writing file");

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "write_file".into(),
                reason: format!("cannot write `{raw}`: {e}"),
            })?;

        Ok(format!("wrote {} bytes to {raw}", content.len()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());
        let read = ReadFileTool::new(dir.path());

        let report = write
            .execute(json!({"path": "notes/a.txt", "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(report, "wrote 5 bytes to notes/a.txt");

        let contents = read.execute(json!({"path": "notes/a.txt"})).await.unwrap();
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path());

        let err = read
            .execute(json!({"path": "../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn absolute_path_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path());

        let err = write
            .execute(json!({"path": "/etc/shadow", "content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_execution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path());

        let err = read.execute(json!({"path": "nope.txt"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
