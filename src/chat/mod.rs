//! Streaming completion client: owns one conversation and runs turns.

pub mod accumulator;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info};

use crate::error::AgentError;
use crate::provider::{CompletionBackend, CompletionRequest};
use crate::tools::ToolDescriptor;
use crate::types::{Message, ToolCall};

pub use accumulator::ToolCallAccumulator;

/// Callback receiving each text fragment as soon as it arrives.
pub type DeltaSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Result of one completion turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    /// Empty exactly when the model requested no tools this turn.
    pub tool_calls: Vec<ToolCall>,
}

/// A single model session over an append-only conversation history.
pub struct ChatClient {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    tools: Vec<ToolDescriptor>,
    history: Vec<Message>,
    delta_sink: Option<DeltaSink>,
    idle_timeout: Option<Duration>,
}

impl ChatClient {
    /// Create a session, seeding the history with the system prompt and then
    /// the context message when either is non-empty.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        system_prompt: Option<&str>,
        tools: Vec<ToolDescriptor>,
        context: Option<&str>,
    ) -> Self {
        let mut history = Vec::new();
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            history.push(Message::system(system));
        }
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            history.push(Message::user(context));
        }

        Self {
            backend,
            model: model.into(),
            tools,
            history,
            delta_sink: None,
            idle_timeout: None,
        }
    }

    pub fn with_delta_sink(mut self, sink: DeltaSink) -> Self {
        self.delta_sink = Some(sink);
        self
    }

    /// Fail a turn when no delta arrives within `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run one streamed turn, optionally appending a user prompt first.
    ///
    /// Text is surfaced to the delta sink as it arrives. On success exactly
    /// one assistant message is appended to the history.
    pub async fn chat(&mut self, prompt: Option<&str>) -> Result<ChatResponse, AgentError> {
        info!("CHAT");
        if let Some(prompt) = prompt.filter(|p| !p.is_empty()) {
            self.history.push(Message::user(prompt));
        }

        let request = CompletionRequest {
            model: &self.model,
            messages: &self.history,
            tools: &self.tools,
        };
        let mut stream = self.backend.stream_chat(&request).await?;

        info!("RESPONSE");
        let mut content = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let mut deltas = 0usize;

        loop {
            let next = match self.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| AgentError::Timeout(limit.as_millis() as u64))?,
                None => stream.next().await,
            };
            let Some(delta) = next else { break };
            let delta = delta?;
            deltas += 1;

            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                content.push_str(text);
                if let Some(sink) = &self.delta_sink {
                    sink(text);
                }
            }
            for fragment in &delta.tool_calls {
                accumulator.push(fragment)?;
            }
        }

        let tool_calls = accumulator.finish();
        debug!(
            model = %self.model,
            deltas,
            text_len = content.len(),
            tool_calls = tool_calls.len(),
            "turn complete"
        );

        self.history
            .push(Message::assistant(content.clone(), tool_calls.clone()));

        Ok(ChatResponse {
            content,
            tool_calls,
        })
    }

    /// Append a tool result. The call id is not checked against issued calls.
    pub fn append_tool_result(&mut self, tool_call_id: &str, output: impl Into<String>) {
        self.history.push(Message::tool(tool_call_id, output));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatDelta, ToolCallFragment};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Turn = Vec<Result<ChatDelta, AgentError>>;

    struct ScriptedBackend {
        turns: Mutex<VecDeque<Turn>>,
        requests: Mutex<Vec<(Vec<Message>, usize)>>,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<Turn>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn stream_chat(
            &self,
            request: &CompletionRequest<'_>,
        ) -> Result<BoxStream<'static, Result<ChatDelta, AgentError>>, AgentError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.messages.to_vec(), request.tools.len()));
            let turn = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Stream("no scripted turn left".into()))?;
            Ok(Box::pin(futures::stream::iter(turn)))
        }
    }

    fn client(backend: Arc<ScriptedBackend>) -> ChatClient {
        ChatClient::new(backend, "test-model", None, Vec::new(), None)
    }

    #[test]
    fn seeds_system_then_context() {
        let backend = ScriptedBackend::new(vec![]);
        let client = ChatClient::new(
            backend,
            "m",
            Some("be helpful"),
            Vec::new(),
            Some("retrieved context"),
        );
        assert_eq!(
            client.history(),
            &[
                Message::system("be helpful"),
                Message::user("retrieved context")
            ]
        );
    }

    #[test]
    fn empty_seeds_are_skipped() {
        let backend = ScriptedBackend::new(vec![]);
        let client = ChatClient::new(backend, "m", Some(""), Vec::new(), Some(""));
        assert!(client.history().is_empty());
    }

    #[tokio::test]
    async fn text_deltas_concatenate_and_reach_sink_in_order() {
        let backend = ScriptedBackend::new(vec![vec![
            Ok(ChatDelta::text("Hel")),
            Ok(ChatDelta::text("")),
            Ok(ChatDelta::text("lo")),
        ]]);
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_seen = seen.clone();
        let mut client = client(backend.clone()).with_delta_sink(Arc::new(move |text: &str| {
            sink_seen.lock().unwrap().push(text.to_string());
        }));

        let response = client.chat(Some("hi")).await.unwrap();

        assert_eq!(response.content, "Hello");
        assert!(response.tool_calls.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["Hel", "lo"]);
        assert_eq!(
            client.history(),
            &[Message::user("hi"), Message::assistant("Hello", vec![])]
        );
    }

    #[tokio::test]
    async fn tool_call_fragments_are_assembled_into_history() {
        let backend = ScriptedBackend::new(vec![vec![
            Ok(ChatDelta::tool_call(
                ToolCallFragment::new(0).with_id("call_1").with_name("fetch_url"),
            )),
            Ok(ChatDelta::tool_call(
                ToolCallFragment::new(0).with_arguments("{\"url\":"),
            )),
            Ok(ChatDelta::tool_call(
                ToolCallFragment::new(0).with_arguments("\"https://x\"}"),
            )),
        ]]);
        let mut client = client(backend);

        let response = client.chat(Some("fetch it")).await.unwrap();

        let expected = ToolCall::new("call_1", "fetch_url", r#"{"url":"https://x"}"#);
        assert_eq!(response.tool_calls, vec![expected.clone()]);
        assert_eq!(client.history()[1], Message::assistant("", vec![expected]));
    }

    #[tokio::test]
    async fn history_grows_by_one_per_chat_and_per_tool_result() {
        let backend = ScriptedBackend::new(vec![
            vec![Ok(ChatDelta::tool_call(
                ToolCallFragment::new(0)
                    .with_id("a")
                    .with_name("t")
                    .with_arguments("{}"),
            ))],
            vec![Ok(ChatDelta::text("done"))],
        ]);
        let mut client = ChatClient::new(backend.clone(), "m", Some("sys"), Vec::new(), None);

        client.chat(Some("go")).await.unwrap();
        client.append_tool_result("a", "result");
        client.chat(None).await.unwrap();

        // 1 seed + 1 prompt + 2 assistant turns + 1 tool result
        assert_eq!(client.history().len(), 5);
        assert_eq!(client.history()[3], Message::tool("a", "result"));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].0.len(), 4);
    }

    #[tokio::test]
    async fn request_carries_tool_set() {
        let backend = ScriptedBackend::new(vec![vec![Ok(ChatDelta::text("ok"))]]);
        let tools = vec![ToolDescriptor::new("fetch_url", "", json!({"type": "object"}))];
        let mut client = ChatClient::new(backend.clone(), "m", None, tools, None);

        client.chat(Some("x")).await.unwrap();

        assert_eq!(backend.requests.lock().unwrap()[0].1, 1);
    }

    #[tokio::test]
    async fn mid_stream_error_propagates_without_assistant_message() {
        let backend = ScriptedBackend::new(vec![vec![
            Ok(ChatDelta::text("partial")),
            Err(AgentError::Stream("connection reset".into())),
        ]]);
        let mut client = client(backend);

        let err = client
            .chat(Some("hi"))
            .await
            .expect_err("stream failure should propagate");

        assert!(matches!(err, AgentError::Stream(_)));
        assert_eq!(client.history(), &[Message::user("hi")]);
    }

    struct StalledBackend;

    #[async_trait]
    impl CompletionBackend for StalledBackend {
        fn provider_name(&self) -> &str {
            "stalled"
        }

        async fn stream_chat(
            &self,
            _request: &CompletionRequest<'_>,
        ) -> Result<BoxStream<'static, Result<ChatDelta, AgentError>>, AgentError> {
            Ok(Box::pin(futures::stream::pending()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_fails_stalled_turn() {
        let mut client = ChatClient::new(Arc::new(StalledBackend), "m", None, Vec::new(), None)
            .with_idle_timeout(Some(Duration::from_secs(5)));

        let err = client
            .chat(Some("hi"))
            .await
            .expect_err("stalled stream should time out");

        assert!(matches!(err, AgentError::Timeout(5000)));
    }
}
