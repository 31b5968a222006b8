//! Engagement enrichment for forum records.
//!
//! The model-search transport only estimates engagement (usually not at
//! all). For every forum record whose URL points at a thread, the thread's
//! public JSON is fetched and its real vote and comment counts replace the
//! estimate. Lookups run with bounded concurrency and a small random delay
//! each, and never fail the session: a miss keeps the estimate.

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::fmt;

use crate::backends::forum_listing;
use crate::config::SearchConfig;
use crate::http;
use crate::orchestrator::origin::{forum_thread, ForumThread};
use crate::types::{RawRecord, Source};

/// Why a record kept its estimated engagement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentMiss {
    /// The endpoint throttled us.
    RateLimited,
    /// The thread is gone or private.
    NotFound,
    /// Connection or unexpected status.
    Transport(String),
    /// The body was not a thread document.
    Malformed(String),
}

impl fmt::Display for EnrichmentMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("rate limited"),
            Self::NotFound => f.write_str("thread not found"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed thread: {msg}"),
        }
    }
}

/// Outcome counts of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EnrichmentStats {
    /// Records looked up.
    pub attempted: usize,
    /// Records whose counters were replaced.
    pub enriched: usize,
    /// Lookups that failed.
    pub missed: usize,
}

/// Fetches authoritative counters for forum threads.
pub struct Enricher {
    client: reqwest::Client,
    base_url: String,
    concurrency: usize,
    delay_ms: (u64, u64),
}

impl Enricher {
    /// Create an enricher from session config, sharing the session client.
    pub fn new(client: reqwest::Client, config: &SearchConfig) -> Self {
        Self {
            client,
            base_url: config.forum.listing_base_url.trim_end_matches('/').to_owned(),
            concurrency: config.enrich_concurrency.max(1),
            delay_ms: config.enrich_delay_ms,
        }
    }

    /// Enrich every eligible record in place.
    ///
    /// Eligible: forum source, engagement not yet verified, URL locating a
    /// thread. Other records are untouched.
    pub async fn enrich(&self, records: &mut [RawRecord]) -> EnrichmentStats {
        let targets: Vec<(usize, ForumThread)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.source == Source::Forum && !r.engagement_verified)
            .filter_map(|(i, r)| forum_thread(&r.url).map(|t| (i, t)))
            .collect();

        let mut stats = EnrichmentStats {
            attempted: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            return stats;
        }

        let outcomes: Vec<(usize, Result<RawRecord, EnrichmentMiss>)> = stream::iter(targets)
            .map(|(index, thread)| async move {
                tokio::time::sleep(http::jitter(self.delay_ms)).await;
                (index, self.lookup(&thread).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (index, outcome) in outcomes {
            match outcome {
                Ok(fetched) => {
                    apply(&mut records[index], fetched);
                    stats.enriched += 1;
                }
                Err(miss) => {
                    tracing::debug!(url = %records[index].url, %miss, "engagement lookup missed");
                    stats.missed += 1;
                }
            }
        }

        tracing::debug!(
            attempted = stats.attempted,
            enriched = stats.enriched,
            missed = stats.missed,
            "engagement enrichment done"
        );
        stats
    }

    /// JSON document URL of a thread.
    pub(crate) fn thread_url(&self, thread: &ForumThread) -> String {
        match &thread.community {
            Some(community) => format!("{}/r/{community}/comments/{}.json", self.base_url, thread.id),
            None => format!("{}/comments/{}.json", self.base_url, thread.id),
        }
    }

    async fn lookup(&self, thread: &ForumThread) -> Result<RawRecord, EnrichmentMiss> {
        let response = self
            .client
            .get(self.thread_url(thread))
            .query(&[("limit", "1"), ("raw_json", "1")])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EnrichmentMiss::Transport(e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => {}
            429 => return Err(EnrichmentMiss::RateLimited),
            403 | 404 => return Err(EnrichmentMiss::NotFound),
            code => return Err(EnrichmentMiss::Transport(format!("HTTP {code}"))),
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EnrichmentMiss::Malformed(e.to_string()))?;
        parse_thread(&body, &self.base_url)
    }
}

/// Extract the submission from a thread document
/// (`[{post listing}, {comment listing}]`).
pub(crate) fn parse_thread(body: &Value, base_url: &str) -> Result<RawRecord, EnrichmentMiss> {
    let post = body
        .get(0)
        .and_then(|listing| listing.pointer("/data/children/0/data"))
        .ok_or_else(|| EnrichmentMiss::Malformed("no submission in thread".into()))?;
    forum_listing::parse_post(post, base_url)
        .ok_or_else(|| EnrichmentMiss::Malformed("submission without permalink".into()))
}

/// Overwrite counters and fill gaps from the authoritative copy.
fn apply(record: &mut RawRecord, fetched: RawRecord) {
    record.engagement = fetched.engagement;
    record.engagement_verified = true;
    if record.timestamp.is_none() {
        record.timestamp = fetched.timestamp;
    }
    if record.author.is_none() {
        record.author = fetched.author;
    }
    if record.community.is_none() {
        record.community = fetched.community;
    }
    if record.text.trim().is_empty() {
        record.text = fetched.text;
    }
}
