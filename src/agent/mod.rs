//! Agent: owns tool providers and one chat session, and drives the tool loop.

pub mod options;
mod tool_phase;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::{ChatClient, DeltaSink};
use crate::error::AgentError;
use crate::provider::CompletionBackend;
use crate::tools::{ToolDescriptor, ToolProvider, ToolRouter};
use crate::types::Message;

pub use options::AgentOptions;
pub use tool_phase::TOOL_NOT_FOUND;

/// Lifecycle of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Constructed; providers not yet connected.
    Created,
    /// Providers connected and a chat session exists.
    Ready,
    /// Providers closed. Terminal.
    Closed,
}

/// An LLM agent that answers a prompt by calling tools until the model stops
/// asking for them.
pub struct Agent {
    session_id: Uuid,
    options: AgentOptions,
    backend: Arc<dyn CompletionBackend>,
    providers: Vec<Box<dyn ToolProvider>>,
    router: ToolRouter,
    chat: Option<ChatClient>,
    delta_sink: Option<DeltaSink>,
    cancel: CancellationToken,
    state: AgentState,
}

impl Agent {
    /// Create a new agent. Nothing is connected until [`Agent::init`].
    pub fn new(
        options: AgentOptions,
        backend: Arc<dyn CompletionBackend>,
        providers: Vec<Box<dyn ToolProvider>>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            options,
            backend,
            providers,
            router: ToolRouter::default(),
            chat: None,
            delta_sink: None,
            cancel: CancellationToken::new(),
            state: AgentState::Created,
        }
    }

    /// Receive streamed text as it arrives. Takes effect at `init`.
    pub fn with_delta_sink(mut self, sink: DeltaSink) -> Self {
        self.delta_sink = Some(sink);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts an in-flight `invoke` with [`AgentError::Canceled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Tools offered to the model. Empty before `init`.
    pub fn tools(&self) -> &[ToolDescriptor] {
        self.router.descriptors()
    }

    /// Conversation so far, if a session exists.
    pub fn history(&self) -> Option<&[Message]> {
        self.chat.as_ref().map(ChatClient::history)
    }

    /// Connect every provider in order, then open the chat session with the
    /// union of their tools.
    ///
    /// The first provider failure aborts initialization; the agent stays
    /// uninitialized. Providers that already connected are left for `close`.
    pub async fn init(&mut self) -> Result<(), AgentError> {
        match self.state {
            AgentState::Closed => return Err(AgentError::Closed),
            AgentState::Ready => {
                debug!(session = %self.session_id, "init called twice; ignoring");
                return Ok(());
            }
            AgentState::Created => {}
        }

        info!(session = %self.session_id, providers = self.providers.len(), "INIT LLM AND TOOLS");
        for provider in self.providers.iter_mut() {
            provider.init().await?;
        }

        self.router = ToolRouter::build(&self.providers);
        let tool_names = self
            .router
            .descriptors()
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>();
        info!(session = %self.session_id, tools = ?tool_names, "Tools available");

        let mut chat = ChatClient::new(
            self.backend.clone(),
            self.options.model.clone(),
            self.options.system_prompt.as_deref(),
            self.router.descriptors().to_vec(),
            self.options.context.as_deref(),
        )
        .with_idle_timeout(self.options.stream_idle_timeout);
        if let Some(sink) = &self.delta_sink {
            chat = chat.with_delta_sink(sink.clone());
        }

        self.chat = Some(chat);
        self.state = AgentState::Ready;
        Ok(())
    }

    /// Answer `prompt`, executing requested tools until the model replies
    /// without tool calls.
    ///
    /// Tool calls within a turn run one at a time in the order the model
    /// listed them. Tool failures are reported to the model as text rather
    /// than aborting the loop. On the terminal turn every provider is closed
    /// and the final text is returned; a close failure is logged, not returned.
    pub async fn invoke(&mut self, prompt: &str) -> Result<String, AgentError> {
        let chat = match self.state {
            AgentState::Closed => return Err(AgentError::Closed),
            AgentState::Created => return Err(AgentError::NotInitialized),
            AgentState::Ready => self.chat.as_mut().ok_or(AgentError::NotInitialized)?,
        };

        let providers = &self.providers;
        let router = &self.router;
        let cancel = &self.cancel;
        let tool_timeout = self.options.tool_timeout;

        info!(session = %self.session_id, "INVOKE");
        let mut response = cancelable(cancel, chat.chat(Some(prompt))).await?;
        let mut rounds = 0usize;

        while !response.tool_calls.is_empty() {
            rounds += 1;
            if let Some(max) = self.options.max_tool_rounds {
                if rounds > max {
                    warn!(session = %self.session_id, max, "tool round limit reached");
                    let err = AgentError::ToolLoopLimit(max);
                    // Every issued call still needs a result for the history to stay valid.
                    for call in &response.tool_calls {
                        let output = tool_phase::tool_failure(call.name(), &err);
                        chat.append_tool_result(&call.id, output);
                    }
                    return Err(err);
                }
            }

            debug!(
                session = %self.session_id,
                round = rounds,
                calls = response.tool_calls.len(),
                "tool round"
            );
            for call in &response.tool_calls {
                let output = cancelable(cancel, async {
                    Ok(tool_phase::execute_tool_call(providers, router, call, tool_timeout).await)
                })
                .await?;
                chat.append_tool_result(&call.id, output);
            }

            response = cancelable(cancel, chat.chat(None)).await?;
        }

        if let Err(err) = self.close().await {
            warn!(session = %self.session_id, error = %err, "answer ready but providers did not close cleanly");
        }
        Ok(response.content)
    }

    /// Close every provider. Safe to call more than once.
    ///
    /// All providers are attempted; the first error is returned.
    pub async fn close(&mut self) -> Result<(), AgentError> {
        if self.state == AgentState::Closed {
            return Ok(());
        }

        info!(session = %self.session_id, "CLOSE MCP CLIENTS");
        let mut first_error = None;
        for provider in self.providers.iter_mut() {
            if let Err(err) = provider.close().await {
                warn!(provider = provider.name(), error = %err, "failed to close provider");
                first_error.get_or_insert(err);
            }
        }
        self.state = AgentState::Closed;

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn cancelable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AgentError::Canceled),
        result = fut => result,
    }
}
