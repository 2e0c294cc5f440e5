use crate::agent::parser::ParseMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_OLLAMA_MODEL: &str = "adrienbrault/nous-hermes2pro:Q8_0";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const API_KEY_PLACEHOLDER: &str = "<api_key>";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub model: String,
    pub endpoint: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAIConfig {
    pub model: String,
    pub api_key: String,
    pub endpoint: String,
    pub temperature: f64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: API_KEY_PLACEHOLDER.to_string(),
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantsConfig {
    /// Which backend serves the conversation: `ollama` or `openai`.
    pub provider: String,
    pub ollama: OllamaConfig,
    pub openai: OpenAIConfig,
}

impl Default for AssistantsConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub browser: bool,
    pub weather: bool,
    pub open_app: bool,
    pub cmd: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            browser: true,
            weather: true,
            open_app: true,
            cmd: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub tool_call_parsing: ParseMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub assistants: AssistantsConfig,
    pub tools: ToolsConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

impl Config {
    /// Loads `path`, first writing the default configuration there if the
    /// file does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Configuration does not exist, creating {}", path.display());
            save_config(&Config::default(), path)?;
        }
        load_config(path)
    }

    pub fn from_str_with_format(content: &str, path: &Path) -> Result<Self> {
        match Format::of(path) {
            Format::Yaml => serde_yaml::from_str(content)
                .with_context(|| format!("Failed to parse YAML config {}", path.display())),
            Format::Toml => toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML config {}", path.display())),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    tracing::debug!("Loading configuration from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found at {}. Run 'parley init' to create one.",
                path.display()
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        }
    })?;

    Config::from_str_with_format(&content, path)
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }

    let content = match Format::of(path) {
        Format::Yaml => serde_yaml::to_string(config).context("Failed to serialize config to YAML")?,
        Format::Toml => {
            toml::to_string_pretty(config).context("Failed to serialize config to TOML")?
        }
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}
