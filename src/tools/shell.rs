//! Shell command execution tool.
//!
//! Runs a command inside the sandbox via the surface's exec primitive. A
//! clean exit returns the command's stdout as the outcome text; a non-zero
//! exit is reported as a tool failure carrying the exit code and whatever
//! the command printed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::SessionTool;
use crate::error::ToolError;
use crate::surface::SurfaceHandle;
use crate::textutil::truncate_with_suffix_by_bytes;
use crate::types::{ToolDeclaration, ToolOutcome};

/// Maximum bytes of command output to return per stream.
const MAX_OUTPUT_LEN: usize = 4000;

/// Tool that runs shell commands on the leased sandbox.
pub struct BashTool;

#[derive(Deserialize)]
struct Args {
    command: String,
}

#[async_trait]
impl SessionTool for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().into(),
            description:
                "Run a shell command inside the sandbox and return its output. The command runs non-interactively under `sh -c`; long-running commands are cut off at the sandbox's execution timeout.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(
        &self,
        surface: &SurfaceHandle,
        input: &Value,
    ) -> Result<ToolOutcome, ToolError> {
        let args: Args = serde_json::from_value(input.clone())
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let output = surface.run_command(&args.command).await?;
        let stdout = truncate_output(&output.stdout);
        let stderr = truncate_output(&output.stderr);

        if output.exit_code != 0 {
            let printed = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr
            };
            return Err(ToolError::ExecutionFailed(format!(
                "command exited {}: {}",
                output.exit_code,
                printed.trim_end()
            )));
        }

        if stderr.trim().is_empty() {
            Ok(ToolOutcome::text(stdout))
        } else {
            Ok(ToolOutcome::text(format!("{stdout}\n[stderr]\n{stderr}")))
        }
    }
}

fn truncate_output(s: &str) -> String {
    truncate_with_suffix_by_bytes(s, MAX_OUTPUT_LEN, "...[truncated]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::CommandOutput;
    use crate::testsupport::StubSurface;

    fn exec_result(stdout: &str, stderr: &str, exit_code: i32) -> Result<CommandOutput, String> {
        Ok(CommandOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        })
    }

    #[test]
    fn name_is_bash() {
        assert_eq!(BashTool.name(), "bash");
    }

    #[test]
    fn declaration_requires_the_command_field() {
        let declaration = BashTool.declaration();
        assert_eq!(declaration.name, "bash");
        assert_eq!(declaration.parameters["required"][0], "command");
    }

    #[tokio::test]
    async fn clean_exit_returns_stdout_verbatim() {
        let stub = StubSurface::new();
        stub.script_exec(exec_result("hi\n", "", 0));
        let outcome = BashTool
            .execute(&stub.handle(), &json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::text("hi\n"));
        assert_eq!(stub.invoked(), vec!["run_command:echo hi"]);
    }

    #[tokio::test]
    async fn stderr_is_appended_when_present() {
        let stub = StubSurface::new();
        stub.script_exec(exec_result("ok\n", "warning: deprecated\n", 0));
        let outcome = BashTool
            .execute(&stub.handle(), &json!({"command": "build"}))
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Text { text } => {
                assert!(text.starts_with("ok\n"), "got: {text}");
                assert!(text.contains("[stderr]"), "got: {text}");
                assert!(text.contains("warning: deprecated"), "got: {text}");
            }
            other => panic!("expected text outcome, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_becomes_execution_failure() {
        let stub = StubSurface::new();
        stub.script_exec(exec_result("", "no such file\n", 2));
        let err = BashTool
            .execute(&stub.handle(), &json!({"command": "cat missing"}))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("command exited 2"), "got: {text}");
        assert!(text.contains("no such file"), "got: {text}");
    }

    #[tokio::test]
    async fn surface_failure_propagates_as_tool_error() {
        let stub = StubSurface::new();
        stub.script_exec(Err("daemon hung up".into()));
        let err = BashTool
            .execute(&stub.handle(), &json!({"command": "true"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Surface(_)), "got: {err}");
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_dispatch() {
        let stub = StubSurface::new();
        let err = BashTool
            .execute(&stub.handle(), &json!({"cmd": "echo hi"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)), "got: {err}");
        assert!(stub.invoked().is_empty());
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let stub = StubSurface::new();
        stub.script_exec(exec_result(&"x".repeat(MAX_OUTPUT_LEN + 100), "", 0));
        let outcome = BashTool
            .execute(&stub.handle(), &json!({"command": "yes | head"}))
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Text { text } => {
                assert!(text.ends_with("...[truncated]"), "missing marker");
                assert!(text.len() <= MAX_OUTPUT_LEN + "...[truncated]".len());
            }
            other => panic!("expected text outcome, got: {other:?}"),
        }
    }
}
