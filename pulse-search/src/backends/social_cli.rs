//! Social search through the locally installed helper tool.
//!
//! Runs `<program> search "<query> since:YYYY-MM-DD" -n <limit> --json`.
//! The helper reuses the user's browser session, so it costs nothing, but
//! it has no sort switch; sort preferences are ignored here.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::types::{Engagement, QueryScope, RawRecord, SearchRequest, Source, Transport};

use super::responses::{count_field, str_field};
use super::{parse_timestamp, since_date, strip_handle};

/// Longest post text kept.
const MAX_TEXT_CHARS: usize = 500;

/// Counter names and the field spellings the helper has used for them.
const COUNTERS: &[(&str, &[&str])] = &[
    ("likes", &["likeCount", "like_count", "favorite_count"]),
    ("reposts", &["retweetCount", "retweet_count"]),
    ("replies", &["replyCount", "reply_count"]),
    ("quotes", &["quoteCount", "quote_count"]),
];

/// Free social transport.
pub struct SocialCli {
    program: String,
}

impl SocialCli {
    /// Create the transport for the helper `program` (name on `PATH` or
    /// absolute path).
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
        }
    }

    /// Helper arguments for a request.
    fn args(request: &SearchRequest) -> Vec<String> {
        let base = match &request.scope {
            QueryScope::Author(handle) => format!("from:{} {}", strip_handle(handle), request.query),
            QueryScope::Topic | QueryScope::Community(_) => request.query.clone(),
        };
        let query = format!(
            "{} since:{}",
            base.trim(),
            since_date(request.lookback_days).format("%Y-%m-%d")
        );
        vec![
            "search".to_owned(),
            query,
            "-n".to_owned(),
            request.limit.max(1).to_string(),
            "--json".to_owned(),
        ]
    }
}

#[async_trait]
impl Backend for SocialCli {
    fn transport(&self) -> Transport {
        Transport::SocialCli
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        tracing::trace!(query = %request.query, "social helper search");

        let output = Command::new(&self.program)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    BackendError::Unavailable(format!("{} not installed", self.program))
                }
                _ => BackendError::Transport(format!("failed to run {}: {e}", self.program)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message: String = stderr.trim().chars().take(300).collect();
            return Err(BackendError::Transport(format!(
                "{} exited with {}: {message}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut records = parse_helper_output(&stdout)?;
        records.truncate(request.limit);
        Ok(records)
    }
}

/// Parse the helper's JSON output: a bare array of posts or an object
/// holding one under `items` / `tweets`.
pub(crate) fn parse_helper_output(stdout: &str) -> Result<Vec<RawRecord>, BackendError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed)?;
    if let Some(error) = value.get("error").and_then(Value::as_str).filter(|e| !e.is_empty()) {
        return Err(BackendError::Transport(format!("helper error: {error}")));
    }

    let posts: &[Value] = match &value {
        Value::Array(posts) => posts.as_slice(),
        Value::Object(_) => value
            .get("items")
            .or_else(|| value.get("tweets"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    Ok(posts.iter().filter_map(parse_post).collect())
}

fn parse_post(post: &Value) -> Option<RawRecord> {
    let user = post
        .get("author")
        .filter(|a| a.is_object())
        .or_else(|| post.get("user"));
    let handle = user
        .map(|u| {
            let name = str_field(u, "username");
            if name.is_empty() {
                str_field(u, "screen_name")
            } else {
                name
            }
        })
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| str_field(post, "author_handle"));
    let handle = strip_handle(&handle);

    let mut url = str_field(post, "permanent_url");
    if url.is_empty() {
        url = str_field(post, "url");
    }
    if url.is_empty() {
        let id = match post.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if !id.is_empty() && !handle.is_empty() {
            url = format!("https://x.com/{handle}/status/{id}");
        }
    }
    if url.is_empty() {
        return None;
    }

    let mut text = str_field(post, "text");
    if text.is_empty() {
        text = str_field(post, "full_text");
    }
    let text: String = text.chars().take(MAX_TEXT_CHARS).collect();

    let mut record = RawRecord::new(Source::Social, url, text);
    record.author = Some(handle).filter(|h| !h.is_empty());

    let created = str_field(post, "createdAt");
    let created = if created.is_empty() {
        str_field(post, "created_at")
    } else {
        created
    };
    record.timestamp = parse_timestamp(&created);

    let mut engagement = Engagement::new();
    for (name, fields) in COUNTERS {
        if let Some(value) = fields.iter().find_map(|f| count_field(post, f)) {
            engagement.set(name, value);
        }
    }
    record.engagement_verified = !engagement.is_empty();
    record.engagement = engagement;
    Some(record)
}
