//! Shell command tool.
//!
//! Runs a command through `sh -c`, races it against a deadline, and hands
//! the model a JSON report of exit code and captured output.  Each output
//! channel is clipped to [`OUTPUT_CAP`] bytes so a chatty command cannot
//! flood the conversation context.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::registry::Tool;
use strand_core::ToolDefinition;

/// Deadline applied when the model does not ask for one.
const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Per-channel cap on captured output, in bytes.
const OUTPUT_CAP: usize = 100 * 1024;

/// Arguments accepted by `run_command`.
#[derive(Debug, Deserialize)]
struct CommandArgs {
    command: String,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// What the model gets back.
#[derive(Debug, Serialize)]
struct CommandReport {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// The `run_command` tool.
pub struct CommandTool {
    working_dir: PathBuf,
    deadline: Duration,
}

impl CommandTool {
    /// Create a command tool rooted at the given working directory.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Override the default deadline.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.deadline = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_command".into(),
            description: "Run a shell command; returns exit code, stdout, and stderr".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to run"
                    },
                    "working_dir": {
                        "type": "string",
                        "description": "Directory to run in (optional)"
                    },
                    "timeout_secs": {
                        "type": "integer",
                        "description": "Deadline in seconds (default: 30)"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let args: CommandArgs =
            serde_json::from_value(params).map_err(|e| ToolError::InvalidParams {
                tool_name: "run_command".into(),
                reason: e.to_string(),
            })?;

        let cwd = args
            .working_dir
            .unwrap_or_else(|| self.working_dir.clone());
        let deadline = args
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.deadline);

        debug!(
            command = %args.command,
            cwd = %cwd.display(),
            deadline_secs = deadline.as_secs(),
            "running command"
        );

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&args.command)
            .current_dir(&cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "run_command".into(),
                reason: format!("spawn failed: {e}"),
            })?;

        // Race completion against the deadline.  Losing the race drops the
        // wait future, and with it the child, which kills the process.
        let output = tokio::select! {
            waited = child.wait_with_output() => {
                waited.map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "run_command".into(),
                    reason: format!("wait failed: {e}"),
                })?
            }
            _ = tokio::time::sleep(deadline) => {
                return Err(ToolError::Timeout {
                    seconds: deadline.as_secs(),
                    reason: format!("`{}` was still running at the deadline", args.command),
                });
            }
        };

        let report = CommandReport {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: clip(&output.stdout),
            stderr: clip(&output.stderr),
        };
        debug!(exit_code = report.exit_code, "command finished");

        Ok(serde_json::to_string(&report)?)
    }
}

/// Cap one output channel, marking inline where it was cut.  The cut lands
/// on a character boundary so lossy-decoded text stays valid.
fn clip(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= OUTPUT_CAP {
        return text.into_owned();
    }

    let mut cut = OUTPUT_CAP;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n[clipped {} of {} bytes]",
        &text[..cut],
        text.len() - cut,
        text.len()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let tool = CommandTool::new("/tmp");
        let result = tool
            .execute(json!({"command": "echo hello"}))
            .await
            .unwrap();

        let report: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(report["exit_code"], 0);
        assert_eq!(report["stdout"], "hello\n");
        assert_eq!(report["stderr"], "");
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_report_not_an_error() {
        let tool = CommandTool::new("/tmp");
        let result = tool.execute(json!({"command": "exit 3"})).await.unwrap();

        let report: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(report["exit_code"], 3);
    }

    #[tokio::test]
    async fn stderr_is_captured_separately() {
        let tool = CommandTool::new("/tmp");
        let result = tool
            .execute(json!({"command": "echo oops >&2"}))
            .await
            .unwrap();

        let report: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(report["stdout"], "");
        assert_eq!(report["stderr"], "oops\n");
    }

    #[tokio::test]
    async fn missing_command_field_is_invalid_params() {
        let tool = CommandTool::new("/tmp");
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn slow_command_hits_the_deadline() {
        let tool = CommandTool::new("/tmp").with_timeout(1);
        let err = tool
            .execute(json!({"command": "sleep 5"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { seconds: 1, .. }));
    }

    #[test]
    fn clip_passes_short_output_through() {
        assert_eq!(clip(b"hello world"), "hello world");
    }

    #[test]
    fn clip_marks_the_cut() {
        let noisy = vec![b'x'; OUTPUT_CAP + 500];
        let clipped = clip(&noisy);
        assert!(clipped.contains("[clipped 500 of"));
        assert!(clipped.len() < noisy.len());
    }

    #[test]
    fn clip_respects_char_boundaries() {
        // Two-byte characters guarantee the cap lands mid-character.
        let wide = "é".repeat(OUTPUT_CAP);
        let clipped = clip(wide.as_bytes());
        assert!(clipped.contains("[clipped"));
        // Slicing mid-character would have panicked inside clip; also make
        // sure what survived is intact.
        assert!(clipped.starts_with('é'));
    }
}
