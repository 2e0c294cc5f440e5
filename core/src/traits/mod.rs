pub mod provider;
pub mod tool;

pub use provider::{ChatMessage, EventStream, Provider, Role, StreamEvent};
pub use tool::{Tool, ToolDescriptor, ToolOutput, ToolParameter, ToolParameters, ToolResult};
