use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            format: None,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(kind, description)
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

pub type ToolParameters = BTreeMap<String, ToolParameter>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    pub use_cases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// The final answer for the turn.
    Text(String),
    /// Raw material that has to be summarized before it can be answered from.
    Prompts(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub success: bool,
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            success: true,
            output: ToolOutput::Text(data.into()),
        }
    }

    pub fn prompts(prompts: Vec<String>) -> Self {
        Self {
            success: true,
            output: ToolOutput::Prompts(prompts),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            output: ToolOutput::Text(reason.into()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    fn parameters(&self) -> ToolParameters;

    fn use_cases(&self) -> Vec<String>;

    async fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Executes the tool. `query` is the effective query for the turn: the
    /// user's question, or the `search` argument when one was given.
    async fn run(&self, arguments: &Map<String, Value>, query: &str) -> anyhow::Result<ToolResult>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description(),
            parameters: self.parameters(),
            use_cases: self.use_cases(),
        }
    }
}
