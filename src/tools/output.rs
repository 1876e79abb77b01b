//! Canonical text form of tool results.

/// Render a tool result as the text stored in a `tool` message.
///
/// Strings pass through unquoted; anything else becomes compact JSON.
pub fn render_tool_output(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
