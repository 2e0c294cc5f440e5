use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One increment of a streamed completion. The last event of a stream has
/// `done` set and may still carry trailing content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    pub delta: String,
    pub done: bool,
}

impl StreamEvent {
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            delta: content.into(),
            done: false,
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        Self {
            delta: content.into(),
            done: true,
        }
    }
}

pub type EventStream = BoxStream<'static, anyhow::Result<StreamEvent>>;

/// A chat-completion backend. Providers know nothing about tools: tool-call
/// detection lives in the conversation engine.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatMessage>;

    async fn complete_stream(&self, messages: &[ChatMessage]) -> anyhow::Result<EventStream>;

    /// Checks that `name` is available on the backend. Remote APIs have
    /// nothing to check.
    async fn show_model(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn pull_model(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
