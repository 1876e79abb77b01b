//! OpenAI Chat Completions streaming backend.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::types::{ChatDelta, FinishReason, Message, ToolCallFragment};

use super::http::{bearer_headers, build_client, parse_sse_line, status_to_error, SseLine};
use super::{CompletionBackend, CompletionRequest};

/// Streams chat completions from an OpenAI-compatible endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a backend from config: API key, base URL, proxy and connect timeout.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let api_key = config.require_api_key()?;
        let client = build_client(config.proxy.as_deref(), config.connect_timeout)?;
        Ok(Self::new(client, api_key, config.base_url.clone()))
    }

    fn build_request_body(&self, request: &CompletionRequest<'_>) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| t.to_function_declaration())
                .collect();
            body["tools"] = tool_defs.into();
        }

        body
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<BoxStream<'static, Result<ChatDelta, AgentError>>, AgentError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI stream_chat"
        );

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut done = false;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(AgentError::Network(e));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                // Split on raw bytes so multi-byte characters spanning chunks stay intact.
                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&line_bytes[..line_end]);

                    match parse_sse_line(&line) {
                        SseLine::Ignored => continue,
                        SseLine::Done => {
                            done = true;
                            break 'read;
                        }
                        SseLine::Data(data) => match decode_stream_chunk(data) {
                            Ok(Some(delta)) => yield Ok(delta),
                            Ok(None) => {}
                            Err(err) => {
                                yield Err(err);
                                return;
                            }
                        },
                    }
                }
            }

            if !done {
                // The last line may arrive without a trailing newline.
                let line = String::from_utf8_lossy(&buffer).into_owned();
                match parse_sse_line(&line) {
                    SseLine::Ignored => {}
                    SseLine::Done => done = true,
                    SseLine::Data(data) => match decode_stream_chunk(data) {
                        Ok(Some(delta)) => yield Ok(delta),
                        Ok(None) => {}
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    },
                }
            }
            if !done {
                yield Err(AgentError::Stream("stream ended before [DONE]".into()));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Decode one SSE data payload into a delta. Usage-only chunks yield `None`.
pub(crate) fn decode_stream_chunk(data: &str) -> Result<Option<ChatDelta>, AgentError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data)
        .map_err(|e| AgentError::Stream(format!("malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(AgentError::Stream(message));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallFragment {
                index: tc.index,
                id: tc.id,
                name,
                arguments,
            }
        })
        .collect();

    Ok(Some(ChatDelta {
        content: choice.delta.content,
        tool_calls,
        finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
    }))
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    s.parse().ok()
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    match msg {
        Message::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => {
            let tc_json: Vec<serde_json::Value> = tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.function.name,
                            "arguments": tc.function.arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": if content.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(content.clone()) },
                "tool_calls": tc_json,
            })
        }
        Message::Tool {
            tool_call_id,
            content,
        } => serde_json::json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
        other => serde_json::json!({ "role": other.role(), "content": other.text() }),
    }
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    #[test]
    fn decodes_text_delta() {
        let delta = decode_stream_chunk(r#"{"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(delta.content.as_deref(), Some("Hel"));
        assert!(delta.tool_calls.is_empty());
        assert!(delta.finish_reason.is_none());
    }

    #[test]
    fn decodes_tool_call_fragment_with_partial_fields() {
        let delta = decode_stream_chunk(
            r#"{"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"index":1,"function":{"arguments":"{\"ur"}}]}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            delta.tool_calls,
            vec![ToolCallFragment::new(1).with_arguments(r#"{"ur"#)]
        );
    }

    #[test]
    fn decodes_finish_reason() {
        let delta = decode_stream_chunk(
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(delta.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn usage_only_chunk_is_skipped() {
        let delta = decode_stream_chunk(r#"{"choices":[],"usage":{"total_tokens":3}}"#).unwrap();
        assert!(delta.is_none());
    }

    #[test]
    fn error_payload_becomes_stream_error() {
        let err = decode_stream_chunk(r#"{"error":{"message":"overloaded"}}"#)
            .expect_err("error payload should fail the turn");
        assert!(matches!(err, AgentError::Stream(message) if message == "overloaded"));
    }

    #[test]
    fn malformed_chunk_is_stream_error() {
        assert!(matches!(
            decode_stream_chunk("{not json"),
            Err(AgentError::Stream(_))
        ));
    }

    #[test]
    fn assistant_with_calls_sends_null_content_and_typed_calls() {
        let msg = Message::assistant(
            "",
            vec![ToolCall::new("call_1", "fetch_url", r#"{"url":"https://x"}"#)],
        );
        assert_eq!(
            message_to_openai(&msg),
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "fetch_url", "arguments": "{\"url\":\"https://x\"}"}
                }]
            })
        );
    }

    #[test]
    fn plain_messages_keep_role_and_content() {
        assert_eq!(
            message_to_openai(&Message::assistant("Saved.", vec![])),
            json!({"role": "assistant", "content": "Saved."})
        );
        assert_eq!(
            message_to_openai(&Message::tool("call_1", "ok")),
            json!({"role": "tool", "tool_call_id": "call_1", "content": "ok"})
        );
        assert_eq!(
            message_to_openai(&Message::system("be brief")),
            json!({"role": "system", "content": "be brief"})
        );
    }
}
