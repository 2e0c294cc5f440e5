use thiserror::Error;

/// Errors surfaced by the conversation engine and the assistant facade.
///
/// Every tool-call variant is raised after the speculative assistant entry
/// has been removed from history.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    #[error("could not parse tool call: {0}")]
    ToolCallParse(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("tool '{name}' failed: {reason:#}")]
    ToolExecution { name: String, reason: anyhow::Error },

    #[error("unknown provider: {name}. Available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("setup failed: {0:#}")]
    Setup(anyhow::Error),
}

impl EngineError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ToolCallParse(message.into())
    }

    /// Whether the error left a rolled-back tool-call attempt behind it.
    pub fn is_tool_call_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolCallParse(_) | Self::ToolNotFound(_) | Self::ToolExecution { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
