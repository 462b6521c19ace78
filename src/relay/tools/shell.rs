// SPDX-License-Identifier: MIT

//! Shell command tool.

use crate::adk::error::ToolError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT_SECS: u64 = 30;

static RUN_COMMAND_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "command": {"type": "string", "description": "The shell command to run"}
        },
        "required": ["command"]
    })
});

/// Run a shell command and return its combined output. Commands are
/// killed after 30 seconds.
pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output"
    }

    fn schema(&self) -> &Value {
        &RUN_COMMAND_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("missing string field 'command'".to_string()))?;

        log::info!("Running command: {command}");

        let output = tokio::time::timeout(
            Duration::from_secs(COMMAND_TIMEOUT_SECS),
            Command::new("sh").arg("-c").arg(command).output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            secs: COMMAND_TIMEOUT_SECS,
        })??;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim();

        Ok(json!({
            "output": if text.is_empty() { "(no output)" } else { text },
            "exit_code": output.status.code(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let result = RunCommandTool
            .execute(json!({"command": "echo workflow"}))
            .await
            .unwrap();
        assert_eq!(result["output"], "workflow");
        assert_eq!(result["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_run_command_captures_stderr_and_exit_code() {
        let result = RunCommandTool
            .execute(json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert_eq!(result["output"], "oops");
        assert_eq!(result["exit_code"], 3);
    }

    #[tokio::test]
    async fn test_run_command_empty_output_marker() {
        let result = RunCommandTool
            .execute(json!({"command": "true"}))
            .await
            .unwrap();
        assert_eq!(result["output"], "(no output)");
    }

    #[tokio::test]
    async fn test_missing_command_is_invalid_input() {
        let err = RunCommandTool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
