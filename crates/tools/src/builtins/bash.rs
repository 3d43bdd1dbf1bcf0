//! `bash` — run a shell command under the execution context's timeout and
//! workspace root. No sandboxing beyond the working-directory confinement
//! and the wall-clock timeout (`spec.md` §1 Non-goals).

use async_trait::async_trait;
use chatcore_domain::error::Result;
use chatcore_domain::tool::{
    ExecutionContext, ExecutionResult, ParameterType, ToolCategory, ToolDefinition, ToolParameter,
};
use serde_json::Value;
use tokio::process::Command;

use crate::output_buffer::OutputBuffer;
use crate::registry::Tool;

const MAX_OUTPUT_CHARS: usize = 64 * 1024;

pub struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn definition(&self) -> &ToolDefinition {
        static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
        DEF.get_or_init(|| {
            ToolDefinition::new(
                "bash",
                "Run a shell command in the workspace and return combined stdout/stderr.",
                ToolCategory::Execution,
                vec![ToolParameter::required("command", ParameterType::String, "command to run via `sh -c`")],
            )
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let started = std::time::Instant::now();
        let command = params["command"].as_str().unwrap_or_default();

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.current_dir(&ctx.working_directory);
        cmd.envs(&ctx.env);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.stdin(std::process::Stdio::null());

        let output = cmd.output().await?;

        let mut buffer = OutputBuffer::new(MAX_OUTPUT_CHARS);
        buffer.push(&String::from_utf8_lossy(&output.stdout));
        buffer.push(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);
        let duration_ms = started.elapsed().as_millis() as u64;

        if output.status.success() {
            Ok(ExecutionResult::ok(buffer.into_string(), duration_ms)
                .with_metadata(serde_json::json!({ "exit_code": exit_code })))
        } else {
            Ok(ExecutionResult {
                success: false,
                output: buffer.into_string(),
                error: Some(format!("command exited with status {exit_code}")),
                metadata: Some(serde_json::json!({ "exit_code": exit_code })),
                duration_ms,
                timestamp: chrono::Utc::now(),
            })
        }
    }
}
