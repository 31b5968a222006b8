//! Social search through a language model's live social-search tool.
//!
//! The paid social transport: `POST {base}/responses` with the
//! `x_search` tool. The model reports posts as JSON with estimated
//! engagement counters, which are kept unverified.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::Backend;
use crate::config::SocialSettings;
use crate::error::BackendError;
use crate::types::{Engagement, RawRecord, SearchRequest, Source, Transport};

use super::responses::{self, count_field, str_field};
use super::{parse_timestamp, strip_handle};

const MAX_TEXT_CHARS: usize = 500;

const PROMPT: &str = "Search real-time public posts about: {query}\n\n{clause}\n\n\
Prefer posts with substantive content over bare links, and include a range of accounts. \
Reply with JSON only, in this shape:\n\
{\"items\": [{\"text\": \"Post text\", \"url\": \"https://x.com/user/status/123\", \
\"author_handle\": \"user\", \"date\": \"YYYY-MM-DD or null\", \
\"engagement\": {\"likes\": 0, \"reposts\": 0, \"replies\": 0, \"quotes\": 0}}]}";

/// Paid social transport.
pub struct SocialApi {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl SocialApi {
    /// Create the transport from social settings.
    pub fn new(client: reqwest::Client, api_key: &str, settings: &SocialSettings) -> Self {
        Self {
            client,
            api_key: api_key.to_owned(),
            endpoint: responses::responses_url(&settings.api_base_url),
            model: settings.resolved_model(),
        }
    }
}

#[async_trait]
impl Backend for SocialApi {
    fn transport(&self) -> Transport {
        Transport::SocialApi
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        tracing::trace!(query = %request.query, "social API search");
        let prompt = PROMPT
            .replace("{query}", &request.query)
            .replace("{clause}", &responses::request_clause(request, "@"));
        let payload = json!({
            "model": self.model,
            "tools": [{"type": "x_search"}],
            "input": [{"role": "user", "content": prompt}],
        });

        let reply = responses::post_json(&self.client, &self.endpoint, &self.api_key, &payload)
            .await
            .map_err(BackendError::from)?;
        let items = responses::parse_reply(&reply)?;
        let mut records = parse_social_items(&items);
        records.truncate(request.limit);
        Ok(records)
    }
}

/// Turn model-reported post items into raw records.
pub(crate) fn parse_social_items(items: &[Value]) -> Vec<RawRecord> {
    items
        .iter()
        .filter_map(|item| {
            let url = str_field(item, "url");
            if url.is_empty() {
                return None;
            }
            let text: String = str_field(item, "text").chars().take(MAX_TEXT_CHARS).collect();
            let mut record = RawRecord::new(Source::Social, url, text);
            record.author = Some(strip_handle(&str_field(item, "author_handle")))
                .filter(|h| !h.is_empty());
            record.timestamp = item
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_timestamp);

            if let Some(counters) = item.get("engagement").filter(|e| e.is_object()) {
                let mut engagement = Engagement::new();
                for name in ["likes", "reposts", "replies", "quotes"] {
                    if let Some(value) = count_field(counters, name) {
                        engagement.set(name, value);
                    }
                }
                record.engagement = engagement;
            }
            Some(record)
        })
        .collect()
}
