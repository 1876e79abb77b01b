//! Model-completion boundary and the OpenAI streaming backend.

pub mod http;
pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::AgentError;
use crate::tools::ToolDescriptor;
use crate::types::{ChatDelta, Message};

pub use openai::OpenAiBackend;

/// One streamed completion request: the full history plus the tool set.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDescriptor],
}

/// Core trait implemented by completion backends.
///
/// The returned stream yields deltas in arrival order and ends when the
/// turn is complete.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// Start a streaming completion turn.
    async fn stream_chat(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<BoxStream<'static, Result<ChatDelta, AgentError>>, AgentError>;
}
