use crate::agent::context::ContextBuilder;
use crate::agent::engine::ConversationEngine;
use crate::agent::parser::ParseMode;
use crate::agent::registry::ToolRegistry;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::providers::create_provider;
use std::sync::Arc;
use tracing::{info, warn};

/// The provider and engine pair chosen once from configuration.
pub struct Assistant {
    engine: ConversationEngine,
    context: ContextBuilder,
}

impl Assistant {
    pub fn new(engine: ConversationEngine) -> Self {
        let context = ContextBuilder::new().with_parse_mode(engine.parse_mode());
        Self { engine, context }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Makes sure the model is available, pulling it when the backend does
    /// not know it, then installs the system prompt.
    pub async fn setup(&mut self) -> EngineResult<()> {
        let provider = Arc::clone(self.engine.provider());
        let model = provider.model().to_string();

        if let Err(e) = provider.show_model(&model).await {
            warn!("Model {} not available ({:#}), pulling it", model, e);
            provider
                .pull_model(&model)
                .await
                .map_err(|e| EngineError::Setup(e.context(format!("failed to pull model {model}"))))?;
            info!("Pulled model {}", model);
        }

        let prompt = self
            .context
            .build_system_prompt(self.engine.registry())
            .map_err(EngineError::Setup)?;
        self.engine.set_system_prompt(prompt);
        Ok(())
    }

    /// Starts the conversation over. Returns how many entries were dropped.
    pub fn reset(&mut self) -> usize {
        self.engine.reset()
    }

    pub async fn send_request<F>(&mut self, text: &str, on_output: F) -> EngineResult<String>
    where
        F: FnMut(&str) + Send,
    {
        self.engine.send_request(text, on_output).await
    }
}

pub fn create_assistant(config: &Config, registry: Arc<ToolRegistry>) -> EngineResult<Assistant> {
    let provider = create_provider(&config.assistants)?;
    info!("Using {} with model {}", provider.name(), provider.model());

    let parse_mode: ParseMode = config.engine.tool_call_parsing;
    let engine = ConversationEngine::new(provider, registry).with_parse_mode(parse_mode);
    Ok(Assistant::new(engine))
}
