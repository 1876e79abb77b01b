//! Expose an MCP server as a [`ToolProvider`].

use async_trait::async_trait;
use tracing::info;

use crate::config::ServerSpec;
use crate::error::AgentError;
use crate::tools::{ToolDescriptor, ToolProvider};

use super::client::MCPClient;
use super::transport::{MCPTransport, StdioTransport};

/// A named MCP server connection with its cached tool list.
pub struct McpToolProvider {
    name: String,
    client: MCPClient,
    tools: Vec<ToolDescriptor>,
}

impl McpToolProvider {
    pub fn new(name: impl Into<String>, transport: Box<dyn MCPTransport>) -> Self {
        Self {
            name: name.into(),
            client: MCPClient::new(transport),
            tools: Vec::new(),
        }
    }

    /// A provider that launches `spec.command` over stdio.
    pub fn stdio(spec: &ServerSpec) -> Self {
        Self::new(
            spec.name.clone(),
            Box::new(StdioTransport::new(spec.command.clone(), spec.args.clone())),
        )
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> Result<(), AgentError> {
        let tag = |e: AgentError| match e {
            AgentError::Provider { message, .. } => AgentError::Provider {
                provider: self.name.clone(),
                message,
            },
            other => other,
        };
        self.client.initialize().await.map_err(tag)?;
        self.tools = self.client.list_tools().await.map_err(tag)?;

        info!(
            server = %self.name,
            tools = ?self.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Connected to server with tools"
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.client.close().await
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, AgentError> {
        self.client.call_tool(name, arguments).await
    }
}
