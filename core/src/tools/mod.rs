use crate::agent::ToolRegistry;
use crate::config::ToolsConfig;
use crate::traits::Tool;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub mod browser;
pub mod cmd;
pub mod open_app;
pub mod weather;

pub use browser::BrowserTool;
pub use cmd::CmdTool;
pub use open_app::OpenAppTool;
pub use weather::WeatherTool;

pub fn extract_string_arg(args: &Map<String, Value>, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

pub fn extract_string_arg_opt(args: &Map<String, Value>, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

/// The tools enabled by `config` for the current platform.
pub fn enabled_tools(config: &ToolsConfig) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    if config.browser {
        tools.push(Arc::new(BrowserTool::new()));
    }
    if config.weather {
        tools.push(Arc::new(WeatherTool::new()));
    }
    if config.open_app && cfg!(target_os = "macos") {
        tools.push(Arc::new(OpenAppTool::new()));
    }
    if config.cmd {
        tools.push(Arc::new(CmdTool::new()));
    }
    tools
}

/// Runs each tool's `setup` once and registers the ones that succeed.
pub async fn register_all(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        let name = tool.name().to_string();
        if let Err(e) = tool.setup().await {
            warn!("Skipping tool '{}': setup failed: {:#}", name, e);
            continue;
        }
        registry.register(name, tool);
    }
    info!("Registered tools: {}", registry.names().join(", "));
    registry
}

pub async fn register_tools(config: &ToolsConfig) -> ToolRegistry {
    register_all(enabled_tools(config)).await
}
