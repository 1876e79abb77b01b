//! Per-agent settings.

use std::time::Duration;

use bon::Builder;

use crate::config::{AgentConfig, DEFAULT_MODEL};

/// Settings that shape one agent's conversation and tool loop.
#[derive(Debug, Clone, Builder)]
pub struct AgentOptions {
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(into)]
    pub system_prompt: Option<String>,
    /// Seeded as a user message right after the system prompt.
    #[builder(into)]
    pub context: Option<String>,
    /// Maximum number of tool rounds per invocation. `None` is unbounded.
    pub max_tool_rounds: Option<usize>,
    /// Per-call limit; an expired call is reported to the model as a failure.
    pub tool_timeout: Option<Duration>,
    pub stream_idle_timeout: Option<Duration>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AgentOptions {
    /// Take model and limits from config. Prompt and context stay unset.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: None,
            context: None,
            max_tool_rounds: config.max_tool_rounds,
            tool_timeout: config.tool_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
