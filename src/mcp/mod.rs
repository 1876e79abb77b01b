//! Model Context Protocol (MCP) client and tool provider.

pub mod client;
pub mod provider;
pub mod transport;

pub use client::MCPClient;
pub use provider::McpToolProvider;
pub use transport::{MCPTransport, StdioTransport};
