//! mcp-agent: a minimal LLM agent runtime over MCP tool servers.
//!
//! An [`Agent`](agent::Agent) owns a set of tool providers and one streaming
//! chat session. Given a prompt it loops: stream a completion, execute the
//! tool calls the model asked for, feed the results back, and stop when the
//! model answers without requesting tools.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_agent::prelude::*;
//!
//! # async fn example() -> mcp_agent::error::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let providers: Vec<Box<dyn ToolProvider>> = ServerSpec::defaults(".")
//!     .iter()
//!     .map(|spec| Box::new(McpToolProvider::stdio(spec)) as Box<dyn ToolProvider>)
//!     .collect();
//! let backend = Arc::new(OpenAiBackend::from_config(&config)?);
//!
//! let mut agent = Agent::new(AgentOptions::from_config(&config), backend, providers);
//! agent.init().await?;
//! let answer = agent.invoke("Summarize https://example.com into notes.md").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub mod cli;
