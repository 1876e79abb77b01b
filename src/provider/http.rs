//! HTTP client construction, SSE parsing, and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::AgentError;

/// Build a reqwest client for one backend.
///
/// With no proxy configured the client ignores proxy environment variables.
pub fn build_client(
    proxy: Option<&str>,
    connect_timeout: Duration,
) -> Result<reqwest::Client, AgentError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(10);
    builder = match proxy {
        Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
        None => builder.no_proxy(),
    };
    Ok(builder.build()?)
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// A parsed SSE line.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    Ignored,
}

/// Classify one SSE line.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        SseLine::Done
    } else if data.is_empty() {
        SseLine::Ignored
    } else {
        SseLine::Data(data)
    }
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> AgentError {
    match status {
        401 | 403 => AgentError::Authentication(body.to_string()),
        _ => AgentError::api(status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_data_lines_are_extracted() {
        assert_eq!(parse_sse_line(r#"data: {"a":1}"#), SseLine::Data(r#"{"a":1}"#));
        assert_eq!(parse_sse_line(r#"data:{"a":1}"#), SseLine::Data(r#"{"a":1}"#));
        assert_eq!(parse_sse_line("data: [DONE]\r"), SseLine::Done);
    }

    #[test]
    fn comments_and_other_fields_are_ignored() {
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Ignored);
        assert_eq!(parse_sse_line("event: message"), SseLine::Ignored);
        assert_eq!(parse_sse_line(""), SseLine::Ignored);
        assert_eq!(parse_sse_line("data: "), SseLine::Ignored);
    }

    #[test]
    fn auth_statuses_map_to_authentication_error() {
        assert!(matches!(
            status_to_error(401, "bad key"),
            AgentError::Authentication(_)
        ));
        assert!(matches!(
            status_to_error(500, "boom"),
            AgentError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn client_builds_with_and_without_proxy() {
        assert!(build_client(Some("http://127.0.0.1:7890"), Duration::from_secs(1)).is_ok());
        assert!(build_client(None, Duration::from_secs(1)).is_ok());
    }
}
