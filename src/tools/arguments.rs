//! Parsing of model-supplied tool arguments.

use serde_json::{Map, Value};

use crate::error::AgentError;

/// Parse a tool call's argument string into a JSON object.
///
/// An empty string or `null` means "no arguments".
pub fn parse_tool_arguments(raw: &str) -> Result<Map<String, Value>, AgentError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(AgentError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
        Err(e) => Err(AgentError::InvalidArgument(format!(
            "tool arguments must be valid JSON: {e}"
        ))),
    }
}
