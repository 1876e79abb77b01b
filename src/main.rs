//! mcp-agent binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcp_agent::cli::{Cli, Commands};
use mcp_agent::config::AgentConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mcp_agent=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match AgentConfig::from_env() {
        Ok(config) => match cli.command {
            Commands::Run(args) => mcp_agent::cli::handle_run(args, &config).await,
            Commands::Tools(args) => mcp_agent::cli::handle_tools(args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
