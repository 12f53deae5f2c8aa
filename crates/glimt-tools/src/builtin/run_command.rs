// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 8_000;

/// Built-in tool that runs a shell command on the host.
///
/// This is the escape hatch for desktop operations that have no dedicated
/// input-action equivalent (opening applications, querying window state).
pub struct RunCommandTool {
    pub timeout_secs: u64,
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Run `command` through the shell with a timeout, returning combined output.
///
/// Shared by [`RunCommandTool`] and the skill adapter so both enforce the
/// same isolation and truncation rules.
pub async fn run_shell(call_id: &str, command: &str, timeout_secs: u64) -> ToolOutput {
    debug!(cmd = %command, "running shell command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    // The subprocess must never read the agent's stdin; kill_on_drop makes
    // the timeout reliably reap the child.
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);

    let result =
        tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output()).await;

    match result {
        Ok(Ok(output)) => {
            let mut content = String::new();
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            if !stdout.is_empty() {
                content.push_str(&truncate(&stdout));
            }
            if !stderr.is_empty() {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str("[stderr]\n");
                content.push_str(&truncate(&stderr));
            }

            let code = output.status.code().unwrap_or(-1);
            if content.is_empty() {
                content = format!("[exit {code}]");
            }
            if code == 0 {
                ToolOutput::ok(call_id, content)
            } else {
                ToolOutput::err(call_id, format!("[exit {code}]\n{content}"))
            }
        }
        Ok(Err(e)) => ToolOutput::err(call_id, format!("spawn error: {e}")),
        Err(_) => ToolOutput::err(call_id, format!("timeout after {timeout_secs}s")),
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }
    let mut end = OUTPUT_LIMIT_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[... {} bytes omitted]", &s[..end], s.len() - end)
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command on the host and return stdout + stderr. \
         Use this for desktop operations that have no input-action \
         equivalent, e.g. launching an application or opening a file. \
         Prefer non-interactive commands."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'command' parameter"),
        };
        run_shell(&call.id, &command, self.timeout_secs).await
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall {
            id: "t1".into(),
            name: "run_command".into(),
            args,
        }
    }

    #[tokio::test]
    async fn echo_succeeds() {
        let tool = RunCommandTool::default();
        let out = tool.execute(&call(json!({"command": "echo hello"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error() {
        let tool = RunCommandTool::default();
        let out = tool.execute(&call(json!({"command": "exit 3"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("[exit 3]"));
    }

    #[tokio::test]
    async fn missing_command_is_error() {
        let tool = RunCommandTool::default();
        let out = tool.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing 'command'"));
    }

    #[tokio::test]
    async fn timeout_kills_long_commands() {
        let tool = RunCommandTool { timeout_secs: 1 };
        let out = tool.execute(&call(json!({"command": "sleep 10"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("timeout"));
    }

    #[test]
    fn truncate_caps_large_output() {
        let big = "x".repeat(OUTPUT_LIMIT_BYTES * 2);
        let t = truncate(&big);
        assert!(t.len() < big.len());
        assert!(t.contains("bytes omitted"));
    }
}
