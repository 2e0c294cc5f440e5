pub mod factory;
pub mod ollama;
pub mod openai;

pub use factory::{AVAILABLE_PROVIDERS, create_provider};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
