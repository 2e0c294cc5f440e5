use crate::config::{API_KEY_PLACEHOLDER, AssistantsConfig};
use crate::error::EngineError;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use std::sync::Arc;

pub const AVAILABLE_PROVIDERS: &[&str] = &["ollama", "openai"];

const OPENAI_KEY_ENV_VARS: &[&str] = &["OPENAI_API_KEY", "PARLEY_OPENAI_API_KEY"];

pub fn create_provider(config: &AssistantsConfig) -> Result<Arc<dyn Provider>, EngineError> {
    match config.provider.trim().to_lowercase().as_str() {
        "ollama" => {
            let provider = OllamaProvider::new()
                .with_model(config.ollama.model.clone())
                .with_base_url(config.ollama.endpoint.clone());
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key_with_fallback(OPENAI_KEY_ENV_VARS, &config.openai.api_key)
                .map_err(EngineError::Setup)?;
            let provider = OpenAIProvider::new(api_key)
                .with_model(config.openai.model.clone())
                .with_base_url(config.openai.endpoint.clone())
                .with_temperature(config.openai.temperature);
            Ok(Arc::new(provider))
        }
        _ => Err(EngineError::UnknownProvider {
            name: config.provider.clone(),
            available: AVAILABLE_PROVIDERS.join(", "),
        }),
    }
}

/// Prefers a key set in the configuration; falls back to the environment
/// when the configured key is empty or still the placeholder.
fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> anyhow::Result<String> {
    let config_key = config_key.trim();
    if !config_key.is_empty() && config_key != API_KEY_PLACEHOLDER {
        return Ok(config_key.to_string());
    }

    env_vars
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key found: set assistants.openai.api_key or one of {}",
                env_vars.join(", ")
            )
        })
}
