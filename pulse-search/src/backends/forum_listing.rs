//! Unauthenticated forum search through the public JSON listing.
//!
//! The free forum transport. `GET /search.json` searches the whole site,
//! `GET /r/{community}/search.json?restrict_sr=on` a single community, and
//! `author:{name}` in the query narrows to one author. Listings carry real
//! vote and comment counts, so records come back verified.

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::http;
use crate::types::{Engagement, QueryScope, RawRecord, SearchRequest, SortOrder, Source, Transport};

use super::{from_epoch, strip_handle};

/// Largest page the listing serves.
const MAX_PAGE: usize = 100;

/// Free forum transport.
pub struct ForumListing {
    client: reqwest::Client,
    base_url: String,
}

impl ForumListing {
    /// Create the transport against `base_url` (normally the forum's web
    /// origin).
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Endpoint and query parameters for a request.
    fn build_request(&self, request: &SearchRequest) -> (String, Vec<(&'static str, String)>) {
        let (url, query, restrict) = match &request.scope {
            QueryScope::Topic => (format!("{}/search.json", self.base_url), request.query.clone(), false),
            QueryScope::Author(name) => (
                format!("{}/search.json", self.base_url),
                format!("author:{} {}", strip_handle(name), request.query),
                false,
            ),
            QueryScope::Community(name) => (
                format!("{}/r/{}/search.json", self.base_url, strip_handle(name)),
                request.query.clone(),
                true,
            ),
        };

        let sort = match request.sort {
            SortOrder::Relevance => "relevance",
            SortOrder::Recent => "new",
            SortOrder::Top => "top",
        };

        let mut params = vec![
            ("q", query.trim().to_owned()),
            ("sort", sort.to_owned()),
            ("t", time_filter(request.lookback_days).to_owned()),
            ("limit", request.limit.clamp(1, MAX_PAGE).to_string()),
            ("type", "link".to_owned()),
            ("raw_json", "1".to_owned()),
        ];
        if restrict {
            params.push(("restrict_sr", "on".to_owned()));
        }
        (url, params)
    }
}

/// Coarsest listing time filter that still covers the window.
fn time_filter(lookback_days: u32) -> &'static str {
    match lookback_days {
        0..=1 => "day",
        2..=7 => "week",
        _ => "month",
    }
}

#[async_trait]
impl Backend for ForumListing {
    fn transport(&self) -> Transport {
        Transport::PublicListing
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawRecord>, BackendError> {
        tracing::trace!(query = %request.query, "public listing search");
        let (url, params) = self.build_request(request);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error(status, &body));
        }

        let listing: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("listing body: {e}")))?;
        let mut records = parse_listing(&listing, &self.base_url);
        records.truncate(request.limit);
        Ok(records)
    }
}

/// Parse a listing (`{"data": {"children": [...]}}`) into records.
///
/// Only submissions (`kind == "t3"`) with a permalink are kept.
pub(crate) fn parse_listing(listing: &Value, base_url: &str) -> Vec<RawRecord> {
    listing
        .pointer("/data/children")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter(|c| c.get("kind").and_then(Value::as_str) == Some("t3"))
                .filter_map(|c| c.get("data"))
                .filter_map(|post| parse_post(post, base_url))
                .collect()
        })
        .unwrap_or_default()
}

/// Convert one submission object into a record with verified counters.
pub(crate) fn parse_post(post: &Value, base_url: &str) -> Option<RawRecord> {
    let permalink = post.get("permalink").and_then(Value::as_str)?;
    if permalink.is_empty() {
        return None;
    }
    let url = if permalink.starts_with("http") {
        permalink.to_owned()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), permalink)
    };

    let title = post.get("title").and_then(Value::as_str).unwrap_or_default().trim();
    let mut record = RawRecord::new(Source::Forum, url, title);
    record.community = post
        .get("subreddit")
        .and_then(Value::as_str)
        .map(strip_handle)
        .filter(|s| !s.is_empty());
    record.author = post
        .get("author")
        .and_then(Value::as_str)
        .map(strip_handle)
        .filter(|s| !s.is_empty());
    record.timestamp = post.get("created_utc").and_then(Value::as_f64).and_then(from_epoch);

    let upvotes = post.get("score").and_then(Value::as_i64).unwrap_or(0).max(0) as u64;
    let comments = post.get("num_comments").and_then(Value::as_u64).unwrap_or(0);
    record.engagement = Engagement::new()
        .with("upvotes", upvotes)
        .with("comments", comments);
    record.engagement_verified = true;
    Some(record)
}
