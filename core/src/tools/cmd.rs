use crate::tools::extract_string_arg;
use crate::traits::{Tool, ToolParameter, ToolParameters, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macOS",
        "linux" => "Linux",
        "windows" => "Windows",
        other => other,
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Runs a command through the platform shell.
pub struct CmdTool {
    workdir: Option<PathBuf>,
}

impl CmdTool {
    pub fn new() -> Self {
        Self { workdir: None }
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl Default for CmdTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CmdTool {
    fn name(&self) -> &str {
        "cmd"
    }

    fn description(&self) -> String {
        format!(
            "CMD is a tool that allows you to run commands in the terminal. I will use commands compatible with {}",
            platform_name()
        )
    }

    fn parameters(&self) -> ToolParameters {
        let mut params = ToolParameters::new();
        params.insert(
            "command".into(),
            ToolParameter::required("string", "The command that you want to run in the terminal."),
        );
        params
    }

    fn use_cases(&self) -> Vec<String> {
        vec!["Run this tool if the user wants to run a command in the terminal.".to_string()]
    }

    async fn run(&self, arguments: &Map<String, Value>, _query: &str) -> anyhow::Result<ToolResult> {
        let command = extract_string_arg(arguments, "command")?;
        debug!("Running command: {}", command);

        let mut cmd = shell_command(&command);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to execute command: {e}"))),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let result = if stdout.is_empty() { stderr } else { stdout };
            Ok(ToolResult::text(result))
        } else {
            let error = if stderr.is_empty() {
                format!("Command failed with status: {}", output.status)
            } else {
                stderr
            };
            Ok(ToolResult::failure(error))
        }
    }
}
