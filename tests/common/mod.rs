//! Shared test helpers: a scripted completion backend and a recording tool provider.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{json, Map, Value};

use mcp_agent::error::AgentError;
use mcp_agent::provider::{CompletionBackend, CompletionRequest};
use mcp_agent::tools::{ToolDescriptor, ToolProvider};
use mcp_agent::types::{ChatDelta, Message, ToolCallFragment};

/// A backend that replays queued turns and records every request.
#[derive(Default)]
pub struct MockBackend {
    turns: Mutex<VecDeque<Vec<ChatDelta>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a turn that streams `text` in the given pieces.
    pub fn queue_text(&self, pieces: &[&str]) {
        self.queue_turn(pieces.iter().map(|p| ChatDelta::text(*p)).collect());
    }

    /// Queue a turn requesting `calls` as `(id, name, arguments)`, streamed
    /// with the arguments split into small fragments.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, Value)]) {
        let mut deltas = Vec::new();
        for (index, (id, name, args)) in calls.iter().enumerate() {
            deltas.push(ChatDelta::tool_call(
                ToolCallFragment::new(index).with_id(*id).with_name(*name),
            ));
            let chars: Vec<char> = args.to_string().chars().collect();
            for chunk in chars.chunks(4) {
                deltas.push(ChatDelta::tool_call(
                    ToolCallFragment::new(index).with_arguments(chunk.iter().collect::<String>()),
                ));
            }
        }
        self.queue_turn(deltas);
    }

    pub fn queue_turn(&self, deltas: Vec<ChatDelta>) {
        self.turns.lock().unwrap().push_back(deltas);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<BoxStream<'static, Result<ChatDelta, AgentError>>, AgentError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Stream("mock backend has no queued turn".into()))?;
        Ok(Box::pin(futures::stream::iter(turn.into_iter().map(Ok))))
    }
}

/// How a [`RecordingProvider`] tool responds.
#[derive(Clone)]
pub enum ToolBehavior {
    /// Return this value after a delay.
    Reply(Value, Duration),
    /// Fail with a tool execution error.
    Fail(String),
    /// Never complete.
    Hang,
}

pub fn reply(value: Value) -> ToolBehavior {
    ToolBehavior::Reply(value, Duration::ZERO)
}

pub fn reply_after(value: Value, millis: u64) -> ToolBehavior {
    ToolBehavior::Reply(value, Duration::from_millis(millis))
}

/// Events shared by every provider in a test, in the order they happened.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Arguments each tool was called with, across all providers sharing the log.
pub type CallLog = Arc<Mutex<Vec<(String, Map<String, Value>)>>>;

/// A tool provider with scripted tools that logs lifecycle and calls.
pub struct RecordingProvider {
    name: String,
    behaviors: HashMap<String, ToolBehavior>,
    advertised: Vec<ToolDescriptor>,
    tools: Vec<ToolDescriptor>,
    log: EventLog,
    fail_init: bool,
    calls: CallLog,
}

impl RecordingProvider {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            behaviors: HashMap::new(),
            advertised: Vec::new(),
            tools: Vec::new(),
            log: log.clone(),
            fail_init: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tool(mut self, tool: &str, behavior: ToolBehavior) -> Self {
        self.advertised.push(ToolDescriptor::new(
            tool,
            format!("{tool} tool"),
            json!({"type": "object", "properties": {}}),
        ));
        self.behaviors.insert(tool.to_string(), behavior);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Handle to the arguments this provider receives.
    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn boxed(self) -> Box<dyn ToolProvider> {
        Box::new(self)
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ToolProvider for RecordingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> Result<(), AgentError> {
        self.record(format!("init:{}", self.name));
        if self.fail_init {
            return Err(AgentError::provider(
                self.name.clone(),
                "server exited during handshake",
            ));
        }
        self.tools = self.advertised.clone();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.record(format!("close:{}", self.name));
        Ok(())
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, AgentError> {
        self.record(format!("start:{name}"));
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        let behavior = self.behaviors.get(name).cloned().ok_or_else(|| {
            AgentError::provider(self.name.clone(), format!("unknown tool {name}"))
        })?;
        let result = match behavior {
            ToolBehavior::Reply(value, delay) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            ToolBehavior::Fail(message) => Err(AgentError::ToolExecution {
                tool_name: name.to_string(),
                message,
            }),
            ToolBehavior::Hang => futures::future::pending::<Result<Value, AgentError>>().await,
        };
        self.record(format!("end:{name}"));
        result
    }
}
