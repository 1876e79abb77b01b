//! Runtime configuration (code > env > defaults).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AgentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the completion backend and the tool loop.
///
/// Network settings (proxy, timeouts) are plain values handed to the
/// backend at construction; nothing here touches process-wide state.
#[derive(Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub proxy: Option<String>,
    pub model: String,
    pub max_tool_rounds: Option<usize>,
    pub tool_timeout: Option<Duration>,
    pub stream_idle_timeout: Option<Duration>,
    pub connect_timeout: Duration,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("model", &self.model)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("tool_timeout", &self.tool_timeout)
            .field("stream_idle_timeout", &self.stream_idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            model: DEFAULT_MODEL.to_string(),
            max_tool_rounds: None,
            tool_timeout: None,
            stream_idle_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl AgentConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_API_BASE_URL").or_else(|| get("OPENAI_BASE_URL")) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config.proxy = get("HTTPS_PROXY").or_else(|| get("https_proxy"));
        if let Some(model) = get("MCP_AGENT_MODEL") {
            config.model = model;
        }

        config.max_tool_rounds = parse_var(&get, "MCP_AGENT_MAX_TOOL_ROUNDS")?;
        config.tool_timeout =
            parse_var::<u64>(&get, "MCP_AGENT_TOOL_TIMEOUT_SECS")?.map(Duration::from_secs);
        config.stream_idle_timeout = parse_var::<u64>(&get, "MCP_AGENT_STREAM_IDLE_TIMEOUT_SECS")?
            .map(Duration::from_secs);
        if let Some(secs) = parse_var::<u64>(&get, "MCP_AGENT_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// The API key, or an authentication error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AgentError::Authentication("Missing OPENAI_API_KEY".into()))
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AgentError::Configuration(format!("{key}={raw}: {e}"))),
    }
}

/// Launch description for one tool-provider process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

impl ServerSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
        }
    }

    /// The fetch and filesystem servers used when nothing is configured.
    pub fn defaults(workdir: &str) -> Vec<Self> {
        vec![
            Self::new("fetch", "uvx", vec!["mcp-server-fetch".into()]),
            Self::new(
                "file",
                "npx",
                vec![
                    "-y".into(),
                    "@modelcontextprotocol/server-filesystem".into(),
                    workdir.to_string(),
                ],
            ),
        ]
    }
}

/// Parses `name=command arg1 arg2`.
impl FromStr for ServerSpec {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, rest) = s.split_once('=').ok_or_else(|| {
            AgentError::Configuration(format!("server spec '{s}' must look like name=command args"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AgentError::Configuration(format!(
                "server spec '{s}' has an empty name"
            )));
        }
        let mut parts = rest.split_whitespace();
        let command = parts.next().ok_or_else(|| {
            AgentError::Configuration(format!("server spec '{s}' has an empty command"))
        })?;
        Ok(Self::new(name, command, parts.map(str::to_string).collect()))
    }
}
