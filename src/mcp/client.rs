//! MCP client for connecting to MCP servers.

use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, JsonObject, ProtocolVersion,
        ResourceContents,
    },
    service::{ClientInitializeError, ServiceError},
};
use tracing::debug;

use crate::error::AgentError;
use crate::tools::ToolDescriptor;

use super::transport::{MCPRunningService, MCPTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Disconnected,
    Initialized,
    Closed,
}

/// Client for a Model Context Protocol server.
pub struct MCPClient {
    transport: Box<dyn MCPTransport>,
    session: Option<MCPRunningService>,
    state: MCPConnectionState,
}

impl MCPClient {
    /// Create a new MCP client with the given transport.
    pub fn new(transport: Box<dyn MCPTransport>) -> Self {
        Self {
            transport,
            session: None,
            state: MCPConnectionState::Disconnected,
        }
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        self.state
    }

    /// Connect and run the initialize handshake. No-op when already initialized.
    pub async fn initialize(&mut self) -> Result<(), AgentError> {
        match self.state {
            MCPConnectionState::Initialized => return Ok(()),
            MCPConnectionState::Closed => {
                return Err(AgentError::Stream("MCP session is closed".into()))
            }
            MCPConnectionState::Disconnected => {}
        }

        let session = self.connect_with_protocol_fallback().await?;
        self.session = Some(session);
        self.state = MCPConnectionState::Initialized;
        Ok(())
    }

    /// List available tools from the MCP server.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        let session = self.active_session()?;

        let tools = match session.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                session
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error("list_tools", e))?
                    .tools
            }
            Err(e) => return Err(map_service_error("list_tools", e)),
        };

        Ok(tools.into_iter().map(map_mcp_tool).collect())
    }

    /// Execute a tool on the MCP server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<serde_json::Value, AgentError> {
        let session = self.active_session()?;

        let result = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments: Some(arguments),
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e))?;

        map_call_result(name, result)
    }

    /// Shut the session down. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<(), AgentError> {
        self.state = MCPConnectionState::Closed;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let reason = session
            .cancel()
            .await
            .map_err(|e| AgentError::provider("mcp", format!("close failed: {e}")))?;
        debug!(?reason, "MCP session closed");
        Ok(())
    }

    fn active_session(&self) -> Result<&MCPRunningService, AgentError> {
        match (self.state, self.session.as_ref()) {
            (MCPConnectionState::Initialized, Some(session)) if !session.is_closed() => {
                Ok(session)
            }
            (MCPConnectionState::Disconnected, _) => Err(AgentError::provider(
                "mcp",
                "MCP client must be initialized first",
            )),
            _ => Err(AgentError::Stream("MCP session is closed".into())),
        }
    }

    async fn connect_with_protocol_fallback(&mut self) -> Result<MCPRunningService, AgentError> {
        let latest_client_info = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        match self.transport.connect(latest_client_info).await {
            Ok(session) => return Ok(session),
            Err(error) if should_retry_protocol_fallback(&error) => {}
            Err(error) => return Err(map_client_initialize_error(error)),
        }

        let fallback_client_info = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        self.transport
            .connect(fallback_client_info)
            .await
            .map_err(map_client_initialize_error)
    }
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_mcp_tool(tool: rmcp::model::Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Reduce a call result to one value: structured content, else joined text,
/// else the raw content list. Error results become `ToolExecution` errors.
fn map_call_result(name: &str, result: CallToolResult) -> Result<serde_json::Value, AgentError> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text_content)
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(AgentError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    if let Some(text) = text_content {
        return Ok(serde_json::Value::String(text));
    }
    Ok(serde_json::Value::Array(
        result
            .content
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect(),
    ))
}

fn map_client_initialize_error(error: ClientInitializeError) -> AgentError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            AgentError::provider("mcp", format!("initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            AgentError::provider("mcp", format!("initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => AgentError::provider(
            "mcp",
            format!(
                "initialize JSON-RPC error {}: {}",
                error.code.0, error.message
            ),
        ),
        ClientInitializeError::Cancelled => AgentError::provider("mcp", "initialize cancelled"),
        other => AgentError::provider("mcp", format!("initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> AgentError {
    match error {
        ServiceError::McpError(error) => AgentError::provider(
            "mcp",
            format!("{context}: MCP error {}: {}", error.code.0, error.message),
        ),
        ServiceError::TransportSend(error) => {
            AgentError::Stream(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            AgentError::Stream(format!("{context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            AgentError::provider("mcp", format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            AgentError::Stream(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => AgentError::Timeout(timeout.as_millis() as u64),
        other => AgentError::provider("mcp", format!("{context}: MCP service error: {other}")),
    }
}
