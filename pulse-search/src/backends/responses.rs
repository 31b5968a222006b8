//! Shared plumbing for the model-search transports.
//!
//! Both paid transports talk to a "responses" style endpoint: a prompt goes
//! in, a server-side search tool runs, and the model answers with free text
//! that should contain a JSON object holding an `items` array.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::BackendError;
use crate::http;
use crate::types::{QueryScope, SearchRequest, SortOrder};

use super::since_date;

/// Phrases a provider uses when an account may not use a model.
const ACCESS_PHRASES: &[&str] = &[
    "verified",
    "organization must be",
    "does not have access",
    "not available",
    "not found",
];

/// A failed POST, keeping status and body for classification.
#[derive(Debug)]
pub enum PostError {
    /// The server answered with a non-success status.
    Status(StatusCode, String),
    /// Anything else.
    Other(BackendError),
}

impl From<PostError> for BackendError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Status(status, body) => http::status_error(status, &body),
            PostError::Other(err) => err,
        }
    }
}

impl PostError {
    /// Whether the account is not entitled to the requested model.
    pub fn is_access_denied(&self) -> bool {
        match self {
            Self::Status(status, body) => {
                matches!(status.as_u16(), 400 | 403) && {
                    let body = body.to_lowercase();
                    ACCESS_PHRASES.iter().any(|p| body.contains(p))
                }
            }
            Self::Other(_) => false,
        }
    }

    /// Whether a gateway rejected the `include` request option.
    pub fn is_invalid_include(&self) -> bool {
        match self {
            Self::Status(status, body) if status.as_u16() == 400 => {
                let body = body.to_lowercase();
                body.contains("include")
                    && ["invalid option", "invalid_value", "zoderror"]
                        .iter()
                        .any(|p| body.contains(p))
            }
            _ => false,
        }
    }
}

/// POST a JSON payload with bearer authentication and decode the reply.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &Value,
) -> Result<Value, PostError> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .await
        .map_err(|e| PostError::Other(e.into()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PostError::Status(status, body));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| PostError::Other(BackendError::Parse(format!("invalid response body: {e}"))))
}

/// Join a base URL and the responses path.
pub fn responses_url(base_url: &str) -> String {
    format!("{}/responses", base_url.trim_end_matches('/'))
}

/// Pull the answer text out of a responses-style (or chat-style) reply.
pub fn output_text(response: &Value) -> Option<String> {
    match response.get("output") {
        Some(Value::String(text)) if !text.is_empty() => return Some(text.clone()),
        Some(Value::Array(items)) => {
            for item in items {
                let text = match item {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(_) if item.get("type").and_then(Value::as_str) == Some("message") => item
                        .get("content")
                        .and_then(Value::as_array)
                        .and_then(|content| {
                            content.iter().find_map(|c| {
                                (c.get("type").and_then(Value::as_str) == Some("output_text"))
                                    .then(|| c.get("text").and_then(Value::as_str))
                                    .flatten()
                            })
                        }),
                    Value::Object(_) => item.get("text").and_then(Value::as_str),
                    _ => None,
                };
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    return Some(text.to_owned());
                }
            }
        }
        _ => {}
    }

    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| {
            choices.iter().find_map(|c| {
                c.get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
            })
        })
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Provider-reported error message embedded in a success reply, if any.
pub fn embedded_error(response: &Value) -> Option<String> {
    match response.get("error")? {
        Value::Null => None,
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        Value::String(s) if s.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Extract the `items` array of the first JSON object in `text`.
///
/// Text without any such object means the model found nothing and yields
/// an empty list; a malformed object is a [`BackendError::Parse`].
pub fn extract_items(text: &str) -> Result<Vec<Value>, BackendError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Ok(Vec::new());
    };
    if end < start || !text[start..].contains("\"items\"") {
        return Ok(Vec::new());
    }

    let object: Value = serde_json::from_str(&text[start..=end])?;
    Ok(object
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Decode a whole reply into its items.
pub fn parse_reply(response: &Value) -> Result<Vec<Value>, BackendError> {
    if let Some(message) = embedded_error(response) {
        return Err(BackendError::Transport(format!("provider error: {message}")));
    }
    match output_text(response) {
        Some(text) => extract_items(&text),
        None => {
            tracing::warn!("no output text in model reply");
            Ok(Vec::new())
        }
    }
}

/// Sentence describing the request's scope, sort and window, appended to
/// the transport's base prompt.
pub fn request_clause(request: &SearchRequest, author_noun: &str) -> String {
    let mut clause = match &request.scope {
        QueryScope::Topic => String::new(),
        QueryScope::Author(name) => format!("Only include items posted by {author_noun}{name}. "),
        QueryScope::Community(name) => format!("Only include threads from r/{name}. "),
    };
    match request.sort {
        SortOrder::Recent => clause.push_str("Prefer the newest items. "),
        SortOrder::Top => clause.push_str("Prefer the most upvoted or liked items. "),
        SortOrder::Relevance => {}
    }
    clause.push_str(&format!(
        "Only include items posted on or after {} (the last {} days). Return at most {} items.",
        since_date(request.lookback_days).format("%Y-%m-%d"),
        request.lookback_days,
        request.limit
    ));
    clause
}

/// String field of a JSON item, trimmed; empty when absent.
pub fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
        .unwrap_or_default()
}

/// Non-negative integer field, accepting numbers or numeric strings.
pub fn count_field(item: &Value, key: &str) -> Option<u64> {
    match item.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
