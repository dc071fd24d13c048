//! Scout Core Library
//!
//! Tool-augmented conversational agent with persisted memory.

pub mod agent;
pub mod config;
pub mod invoker;
pub mod memory;
pub mod model;
pub mod openai;
mod retry;
pub mod tool;
pub mod tools;

// Re-export key types for convenience
pub use agent::{AgentConfig, AgentLoop, TurnOutcome};
pub use config::Config;
pub use invoker::{ToolCallRecord, ToolInvoker};
pub use memory::{MemoryError, MemoryStats, MemoryStore, Role, Turn};
pub use model::{Decision, LanguageModel, ModelError, ToolCall};
pub use openai::OpenAiChatModel;
pub use tool::{Tool, ToolError, ToolRegistry, ToolResult};
pub use tools::{CalculatorTool, WeatherTool, WebSearchTool};
