//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentOptions, AgentState};
pub use crate::chat::{ChatClient, ChatResponse, DeltaSink};
pub use crate::config::{AgentConfig, ServerSpec};
pub use crate::error::{AgentError, Result};
pub use crate::provider::{CompletionBackend, CompletionRequest, OpenAiBackend};
pub use crate::tools::{ToolDescriptor, ToolProvider};
pub use crate::types::{ChatDelta, FinishReason, Message, ToolCall, ToolCallFragment};

#[cfg(feature = "mcp")]
pub use crate::mcp::McpToolProvider;
