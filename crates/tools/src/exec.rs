//! Python and shell execution tools.
//!
//! Foreground-only: spawn, capture combined output, enforce the hard
//! timeout, and honor cancellation. `kill_on_drop` guarantees the child
//! dies with the losing select branch.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;

use mf_domain::config::ExecConfig;

use crate::cancel::CancelToken;
use crate::error::ToolError;
use crate::{Tool, ToolContext};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn until_cancelled(cancel: &CancelToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn run_command(
    mut cmd: Command,
    config: &ExecConfig,
    ctx: &ToolContext,
    label: &str,
) -> Result<String, ToolError> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ToolError::Permanent(format!("failed to spawn {label}: {e}")))?;

    let output = tokio::select! {
        out = child.wait_with_output() => {
            out.map_err(|e| ToolError::Permanent(format!("{label}: {e}")))?
        }
        _ = tokio::time::sleep(Duration::from_secs(config.timeout_sec)) => {
            return Err(ToolError::Timeout(format!(
                "{label} exceeded {}s", config.timeout_sec
            )));
        }
        _ = until_cancelled(&ctx.cancel) => {
            return Err(ToolError::Permanent("run cancelled".into()));
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str("[stderr]\n");
        combined.push_str(&stderr);
    }

    if combined.len() > config.max_output_chars {
        let mut end = config.max_output_chars;
        while !combined.is_char_boundary(end) {
            end -= 1;
        }
        combined.truncate(end);
        combined.push_str("\n[output truncated]");
    }

    if output.status.success() {
        if combined.trim().is_empty() {
            Ok(format!("{label} completed with no output"))
        } else {
            Ok(combined)
        }
    } else {
        let code = output.status.code().unwrap_or(-1);
        // A non-zero exit is a result the worker should see, not an
        // infrastructure failure.
        Ok(format!("{label} exited with code {code}\n{combined}"))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// python_exec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PythonExecTool {
    config: ExecConfig,
}

impl PythonExecTool {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Tool for PythonExecTool {
    fn name(&self) -> &'static str {
        "python_exec"
    }

    fn description(&self) -> &'static str {
        "Run a Python snippet and return its output. Use print() for results."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Python source to execute."}
            },
            "required": ["code"]
        })
    }

    fn idempotent(&self) -> bool {
        false
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Validation("code is required".into()))?;

        let mut cmd = Command::new("python3");
        cmd.arg("-c").arg(code);
        run_command(cmd, &self.config, ctx, "python").await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// shell_exec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ShellExecTool {
    config: ExecConfig,
}

impl ShellExecTool {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &'static str {
        "shell_exec"
    }

    fn description(&self) -> &'static str {
        "Run a shell command and return its combined output."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line passed to sh -c."}
            },
            "required": ["command"]
        })
    }

    fn idempotent(&self) -> bool {
        false
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Validation("command is required".into()))?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        run_command(cmd, &self.config, ctx, "shell").await
    }
}
