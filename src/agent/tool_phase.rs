//! Executing one turn's tool calls against the routed providers.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::AgentError;
use crate::tools::{parse_tool_arguments, render_tool_output, ToolProvider, ToolRouter};
use crate::types::ToolCall;

/// Result text sent back to the model when no provider offers the tool.
pub const TOOL_NOT_FOUND: &str = "Tool not found";

/// Run a single tool call and produce the text to append as its result.
///
/// Never fails: unknown tools, bad arguments, provider errors and timeouts
/// all become text the model can read.
pub(crate) async fn execute_tool_call(
    providers: &[Box<dyn ToolProvider>],
    router: &ToolRouter,
    call: &ToolCall,
    timeout: Option<Duration>,
) -> String {
    let name = call.name();
    info!("TOOL USE");

    let Some(provider) = router.resolve(name).and_then(|index| providers.get(index)) else {
        warn!(tool = name, call_id = %call.id, "Tool not found");
        return TOOL_NOT_FOUND.to_string();
    };

    info!(
        tool = name,
        provider = provider.name(),
        call_id = %call.id,
        arguments = %call.function.arguments,
        "Calling tool"
    );

    let arguments = match parse_tool_arguments(&call.function.arguments) {
        Ok(arguments) => arguments,
        Err(err) => {
            warn!(tool = name, error = %err, "Rejected tool arguments");
            return tool_failure(name, &err);
        }
    };

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.call_tool(name, arguments))
            .await
            .unwrap_or_else(|_| Err(AgentError::Timeout(limit.as_millis() as u64))),
        None => provider.call_tool(name, arguments).await,
    };

    match result {
        Ok(value) => {
            let output = render_tool_output(&value);
            info!(tool = name, result_len = output.len(), "Tool result");
            output
        }
        Err(err) => {
            warn!(tool = name, error = %err, "Tool failed");
            tool_failure(name, &err)
        }
    }
}

pub(crate) fn tool_failure(name: &str, err: &AgentError) -> String {
    format!("Error executing tool {name}: {err}")
}
