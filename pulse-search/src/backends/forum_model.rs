//! Forum search through a language model's web-search tool.
//!
//! The paid forum transport: the model searches the web restricted to the
//! forum domain and reports threads as JSON. Accounts are not entitled to
//! every model, so the request walks an ordered model chain and moves on
//! only when the provider says the model is off-limits.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::backend::Backend;
use crate::config::ForumSettings;
use crate::error::BackendError;
use crate::types::{RawRecord, SearchRequest, Source, Transport};

use super::models;
use super::responses::{self, PostError};
use super::{parse_timestamp, strip_handle};

/// Domain the search tool is restricted to.
const FORUM_DOMAIN: &str = "reddit.com";

const PROMPT: &str = "Find forum discussion threads on reddit.com about: {query}\n\n\
Search for the subject itself, not for words like \"best\" or \"tips\". \
Try several phrasings such as \"{query} site:reddit.com\" and \"reddit {query}\". \
Include every thread about the subject; dates are verified afterwards, so do not \
pre-filter. Thread URLs must contain \"/r/\" and \"/comments/\". \
Skip developers.reddit.com and business.reddit.com.\n\n{clause}\n\n\
Reply with JSON only, in this shape:\n\
{\"items\": [{\"title\": \"Thread title\", \
\"url\": \"https://www.reddit.com/r/sub/comments/abc123/title/\", \
\"subreddit\": \"sub\", \"author\": \"username or null\", \
\"date\": \"YYYY-MM-DD or null\"}]}";

/// Paid forum transport backed by a responses endpoint with web search.
pub struct ForumModelSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    settings: ForumSettings,
    models: OnceCell<Vec<String>>,
}

impl ForumModelSearch {
    /// Create the transport from forum settings. The model chain is
    /// resolved on first use according to the settings' policy.
    pub fn new(client: reqwest::Client, api_key: &str, settings: &ForumSettings) -> Self {
        Self {
            client,
            api_key: api_key.to_owned(),
            endpoint: responses::responses_url(&settings.api_base_url),
            settings: settings.clone(),
            models: OnceCell::new(),
        }
    }

    /// Models in the order they are tried.
    pub async fn models(&self) -> &[String] {
        self.models
            .get_or_init(|| models::resolve_model_chain(&self.client, &self.api_key, &self.settings))
            .await
    }

    fn payload(model: &str, prompt: &str, include_sources: bool) -> Value {
        let mut payload = json!({
            "model": model,
            "tools": [{
                "type": "web_search",
                "filters": {"allowed_domains": [FORUM_DOMAIN]}
            }],
            "input": prompt,
        });
        if include_sources {
            payload["include"] = json!(["web_search_call.action.sources"]);
        }
        payload
    }

    /// One model attempt. A gateway that rejects `include` gets a single
    /// retry without it.
    async fn ask(&self, model: &str, prompt: &str) -> Result<Value, PostError> {
        let payload = Self::payload(model, prompt, true);
        match responses::post_json(&self.client, &self.endpoint, &self.api_key, &payload).await {
            Err(err) if err.is_invalid_include() => {
                tracing::debug!(model, "gateway rejected include option, retrying without it");
                let payload = Self::payload(model, prompt, false);
                responses::post_json(&self.client, &self.endpoint, &self.api_key, &payload).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl Backend for ForumModelSearch {
    fn transport(&self) -> Transport {
        Transport::ModelSearch
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        tracing::trace!(query = %request.query, "forum model search");
        let prompt = PROMPT
            .replace("{query}", &request.query)
            .replace("{clause}", &responses::request_clause(request, "u/"));

        let mut last_denial = None;
        for model in self.models().await {
            match self.ask(model, &prompt).await {
                Ok(reply) => {
                    let items = responses::parse_reply(&reply)?;
                    let mut records = parse_forum_items(&items);
                    records.truncate(request.limit);
                    tracing::debug!(model = %model, count = records.len(), "forum model search done");
                    return Ok(records);
                }
                Err(err) if err.is_access_denied() => {
                    tracing::info!(model = %model, "model not accessible, trying next");
                    last_denial = Some(BackendError::AccessDenied(format!(
                        "model {model} not accessible"
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(last_denial
            .unwrap_or_else(|| BackendError::AccessDenied("no model configured".into())))
    }
}

/// Turn model-reported thread items into raw records.
///
/// Items without a forum URL are dropped. Engagement is left empty for
/// the enricher to fill.
pub(crate) fn parse_forum_items(items: &[Value]) -> Vec<RawRecord> {
    items
        .iter()
        .filter_map(|item| {
            let url = responses::str_field(item, "url");
            if !url.contains(FORUM_DOMAIN) {
                return None;
            }
            let mut record = RawRecord::new(Source::Forum, url, responses::str_field(item, "title"));
            record.community = Some(strip_handle(&responses::str_field(item, "subreddit")))
                .filter(|s| !s.is_empty());
            record.author = Some(strip_handle(&responses::str_field(item, "author")))
                .filter(|s| !s.is_empty() && s != "null");
            record.timestamp = item
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            Some(record)
        })
        .collect()
}
