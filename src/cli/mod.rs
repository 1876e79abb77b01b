//! Command-line front end.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::agent::{Agent, AgentOptions};
use crate::config::{AgentConfig, ServerSpec};
use crate::error::AgentError;
use crate::mcp::McpToolProvider;
use crate::provider::OpenAiBackend;
use crate::tools::{ToolDescriptor, ToolProvider};

/// Answer prompts with an LLM that can call MCP server tools.
#[derive(Parser, Debug)]
#[command(name = "mcp-agent", version, about = "LLM agent over MCP tool servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a prompt, calling tools as needed
    Run(RunArgs),
    /// Connect to the servers and list the tools they offer
    Tools(ServerArgs),
}

/// Which tool servers to launch.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Tool server as `name=command args...` (repeatable). Defaults to fetch + filesystem.
    #[arg(long = "server", value_name = "SPEC")]
    pub servers: Vec<ServerSpec>,

    /// Directory the default filesystem server may access
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,
}

impl ServerArgs {
    pub fn specs(&self) -> Vec<ServerSpec> {
        if self.servers.is_empty() {
            ServerSpec::defaults(&self.workdir.to_string_lossy())
        } else {
            self.servers.clone()
        }
    }

    fn providers(&self) -> Vec<Box<dyn ToolProvider>> {
        self.specs()
            .iter()
            .map(|spec| Box::new(McpToolProvider::stdio(spec)) as Box<dyn ToolProvider>)
            .collect()
    }
}

/// Arguments for `mcp-agent run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// User prompt
    pub prompt: String,

    /// Model name (overrides MCP_AGENT_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// File whose contents are sent as context before the prompt
    #[arg(long)]
    pub context_file: Option<PathBuf>,

    /// Stop after this many tool rounds (overrides MCP_AGENT_MAX_TOOL_ROUNDS)
    #[arg(long)]
    pub max_tool_rounds: Option<usize>,

    /// Print only the final answer instead of streaming it
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub servers: ServerArgs,
}

/// Run one prompt to completion and print the answer.
pub async fn handle_run(args: RunArgs, config: &AgentConfig) -> Result<(), AgentError> {
    let mut options = AgentOptions::from_config(config);
    if let Some(model) = args.model {
        options.model = model;
    }
    if let Some(max) = args.max_tool_rounds {
        options.max_tool_rounds = Some(max);
    }
    options.system_prompt = args.system;
    if let Some(path) = &args.context_file {
        options.context = load_context(path).await?;
    }

    let backend = Arc::new(OpenAiBackend::from_config(config)?);
    let mut agent = Agent::new(options, backend, args.servers.providers());
    if !args.quiet {
        agent = agent.with_delta_sink(Arc::new(|text: &str| {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }));
    }

    let cancel = agent.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = run_agent(&mut agent, &args.prompt).await;
    ctrl_c.abort();
    // Providers are already closed on success; this covers the error paths.
    let closed = agent.close().await;

    let answer = outcome?;
    if args.quiet {
        println!("{answer}");
    } else {
        println!();
    }
    closed
}

/// Read a context file. A blank file means no context.
pub async fn load_context(path: &Path) -> Result<Option<String>, AgentError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        AgentError::Configuration(format!("context file {}: {e}", path.display()))
    })?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

async fn run_agent(agent: &mut Agent, prompt: &str) -> Result<String, AgentError> {
    agent.init().await?;
    info!(session = %agent.session_id(), model = %agent.options().model, "agent ready");
    agent.invoke(prompt).await
}

/// Connect to the servers, print their tools, and disconnect.
pub async fn handle_tools(args: ServerArgs) -> Result<(), AgentError> {
    let mut providers = args.providers();
    let mut listed = Ok(());

    for provider in providers.iter_mut() {
        if let Err(err) = provider.init().await {
            listed = Err(err);
            break;
        }
        println!("{}:", provider.name());
        for tool in provider.tools() {
            println!("  {}", describe_tool(tool));
        }
    }

    let closed = close_all(&mut providers).await;
    listed.and(closed)
}

/// Close every provider, returning the first failure.
async fn close_all(providers: &mut [Box<dyn ToolProvider>]) -> Result<(), AgentError> {
    let mut first_error = None;
    for provider in providers.iter_mut() {
        if let Err(err) = provider.close().await {
            warn!(provider = provider.name(), error = %err, "failed to close provider");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn describe_tool(tool: &ToolDescriptor) -> String {
    let summary = tool.description.lines().next().unwrap_or_default().trim();
    if summary.is_empty() {
        tool.name.clone()
    } else {
        format!("{} - {}", tool.name, summary)
    }
}
