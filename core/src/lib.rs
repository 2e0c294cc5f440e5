pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod tools;
pub mod traits;

pub use agent::{Assistant, ContextBuilder, ConversationEngine, ParseMode, ToolRegistry, create_assistant};
pub use config::*;
pub use error::{EngineError, EngineResult};
pub use providers::*;
pub use tools::*;
pub use traits::*;
