pub mod assistant;
pub mod context;
pub mod engine;
pub mod history;
pub mod parser;
pub mod registry;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use assistant::{Assistant, create_assistant};
pub use context::ContextBuilder;
pub use engine::{ConversationEngine, complete_without_memory, no_memory_messages};
pub use history::{Checkpoint, History};
pub use parser::{ParseMode, ToolInvocation, parse_tool_call};
pub use registry::ToolRegistry;
pub use stream::{TurnClassifier, TurnMode};
