//! Tool provider boundary: runtime-discovered tools (e.g., MCP servers).

use async_trait::async_trait;

use super::types::ToolDescriptor;
use crate::error::AgentError;

/// A connection to a process that advertises and executes tools.
///
/// `init` establishes the connection and caches the advertised tool list;
/// `tools` returns that cache and never performs I/O.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name, used in logs and errors.
    fn name(&self) -> &str;

    /// Connect and discover tools.
    async fn init(&mut self) -> Result<(), AgentError>;

    /// Release the connection. Must succeed when already closed.
    async fn close(&mut self) -> Result<(), AgentError>;

    /// Tools discovered during `init`.
    fn tools(&self) -> &[ToolDescriptor];

    /// Execute a tool by name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, AgentError>;
}
