use crate::tools::{extract_string_arg, extract_string_arg_opt};
use crate::traits::{Tool, ToolParameter, ToolParameters, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

const APPLICATIONS_DIR: &str = "/Applications";
const OPENED: &str = "The application has been opened.";

/// Opens an installed application with `open -a`.
pub struct OpenAppTool {
    launcher: String,
    applications_dir: PathBuf,
    installed: OnceLock<Vec<String>>,
}

impl OpenAppTool {
    pub fn new() -> Self {
        Self {
            launcher: "open".to_string(),
            applications_dir: PathBuf::from(APPLICATIONS_DIR),
            installed: OnceLock::new(),
        }
    }

    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn with_applications_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.applications_dir = dir.into();
        self.installed = OnceLock::new();
        self
    }

    /// The listing taken at setup, or a fresh one if setup never ran.
    fn installed(&self) -> &[String] {
        self.installed
            .get_or_init(|| installed_applications(&self.applications_dir))
    }
}

impl Default for OpenAppTool {
    fn default() -> Self {
        Self::new()
    }
}

fn installed_applications(dir: &Path) -> Vec<String> {
    let mut apps = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        match entry {
            Ok(entry) => apps.push(entry.file_name().to_string_lossy().to_string()),
            Err(e) => {
                warn!("Error while reading {}: {}", dir.display(), e);
                break;
            }
        }
    }
    apps
}

#[async_trait]
impl Tool for OpenAppTool {
    fn name(&self) -> &str {
        "open_app_macos"
    }

    async fn setup(&self) -> anyhow::Result<()> {
        let dir = self.applications_dir.clone();
        let apps = tokio::task::spawn_blocking(move || installed_applications(&dir)).await?;
        let _ = self.installed.set(apps);
        Ok(())
    }

    fn description(&self) -> String {
        let listed = serde_json::to_string(self.installed()).unwrap_or_else(|_| "[]".to_string());
        format!(
            "OpenAppMacOS is a tool that allows you to open an application on macOS. The installed applications are: {listed}"
        )
    }

    fn parameters(&self) -> ToolParameters {
        let mut params = ToolParameters::new();
        params.insert(
            "app".into(),
            ToolParameter::required("string", "The name of the app to open."),
        );
        params.insert(
            "app_arguments".into(),
            ToolParameter::optional("string", "The arguments to pass to the app."),
        );
        params
    }

    fn use_cases(&self) -> Vec<String> {
        vec!["User ask explicitly to open an application.".to_string()]
    }

    async fn run(&self, arguments: &Map<String, Value>, _query: &str) -> anyhow::Result<ToolResult> {
        let app = extract_string_arg(arguments, "app")?;
        let app_arguments = extract_string_arg_opt(arguments, "app_arguments", "");
        debug!("Opening {} with arguments {:?}", app, app_arguments);

        let mut cmd = Command::new(&self.launcher);
        cmd.arg("-a").arg(&app);
        if !app_arguments.trim().is_empty() {
            cmd.arg("--args").args(app_arguments.split_whitespace());
        }

        let status = cmd.status().await?;
        if !status.success() {
            anyhow::bail!("Could not open {app}: {status}");
        }
        Ok(ToolResult::text(OPENED))
    }
}
