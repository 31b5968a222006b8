//! Core types: sources, transports, records, results and entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Community discussion threads (subreddit-style).
    Forum,
    /// Short-form public posts.
    Social,
    /// General web pages, gathered outside this crate.
    Web,
}

impl Source {
    /// Returns the lowercase name used in digests and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Forum => "forum",
            Self::Social => "social",
            Self::Web => "web",
        }
    }

    /// Returns all source variants in digest order.
    pub fn all() -> &'static [Source] {
        &[Self::Forum, Self::Social, Self::Web]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete way of reaching a backend.
///
/// Each searchable source has a free transport and a paid one. Which of
/// them a session uses, and in which order, is decided once by
/// [`crate::capability::detect_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Unauthenticated public JSON search on the forum.
    PublicListing,
    /// Language-model web search restricted to the forum domain (paid).
    ModelSearch,
    /// Session-authenticated local helper tool for the social source.
    SocialCli,
    /// Language-model social search API (paid).
    SocialApi,
}

impl Transport {
    /// Returns the name used in logs and digests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PublicListing => "public_listing",
            Self::ModelSearch => "model_search",
            Self::SocialCli => "social_cli",
            Self::SocialApi => "social_api",
        }
    }

    /// The source this transport searches.
    pub fn source(&self) -> Source {
        match self {
            Self::PublicListing | Self::ModelSearch => Source::Forum,
            Self::SocialCli | Self::SocialApi => Source::Social,
        }
    }

    /// Whether using this transport costs money.
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::ModelSearch | Self::SocialApi)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which search pass produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// Broad topic search.
    Primary,
    /// Entity-scoped supplemental search.
    Supplemental,
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Primary => 1,
            Phase::Supplemental => 2,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Primary),
            2 => Ok(Self::Supplemental),
            other => Err(format!("invalid phase {other}")),
        }
    }
}

/// Named popularity counters (upvotes, comments, likes, reposts, ...).
///
/// Unknown counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Engagement(BTreeMap<String, u64>);

impl Engagement {
    /// Create an empty counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style counter assignment.
    pub fn with(mut self, name: &str, value: u64) -> Self {
        self.set(name, value);
        self
    }

    /// Set a counter, replacing any previous value.
    pub fn set(&mut self, name: &str, value: u64) {
        self.0.insert(name.to_owned(), value);
    }

    /// Read a counter, zero if absent.
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Whether no counter has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add every counter of `other` into this set, saturating.
    pub fn absorb(&mut self, other: &Engagement) {
        for (name, value) in &other.0 {
            let slot = self.0.entry(name.clone()).or_insert(0);
            *slot = slot.saturating_add(*value);
        }
    }
}

/// A record as returned by a backend transport, before normalisation.
///
/// Backends are heterogeneous: dates may be missing, engagement may be an
/// estimate, and the text may be split across title and body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Source the record belongs to.
    pub source: Source,
    /// Link to the item (thread or post URL), used to derive the origin id.
    pub url: String,
    /// Title or post text.
    pub text: String,
    /// Author handle without prefix.
    pub author: Option<String>,
    /// Community name without prefix (forum only).
    pub community: Option<String>,
    /// When the item was posted, if the backend knows.
    pub timestamp: Option<DateTime<Utc>>,
    /// Counters as reported or estimated by the backend.
    pub engagement: Engagement,
    /// Whether `engagement` is authoritative.
    pub engagement_verified: bool,
}

impl RawRecord {
    /// A record with only the mandatory fields set.
    pub fn new(source: Source, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            text: text.into(),
            author: None,
            community: None,
            timestamp: None,
            engagement: Engagement::new(),
            engagement_verified: false,
        }
    }
}

/// One normalised, scoreable item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Which source produced this item.
    pub source: Source,
    /// Canonical backend-native identifier; the deduplication key.
    pub origin_id: String,
    /// Human-facing link.
    pub url: String,
    /// Author handle, if known.
    pub author: Option<String>,
    /// Community name (forum only).
    pub community: Option<String>,
    /// Title or snippet; never empty.
    pub text: String,
    /// When the item was posted.
    pub timestamp: DateTime<Utc>,
    /// True when the backend gave no date and the window start was used.
    pub date_estimated: bool,
    /// Popularity counters.
    pub engagement: Engagement,
    /// Whether `engagement` came from an authoritative source.
    pub engagement_verified: bool,
    /// Composite rank in `[0, 1]`; `None` until scoring runs.
    pub score: Option<f64>,
    /// Search pass that produced this item.
    pub phase: Phase,
}

/// Kind of an extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A posting handle.
    Author,
    /// A forum community.
    Community,
}

/// An author or community that recurs across Phase-1 results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Author or community.
    pub kind: EntityKind,
    /// Handle or community name, without `@` / `u/` / `r/` prefixes.
    pub identifier: String,
    /// Backend the entity was observed on; Phase-2 queries go there.
    pub source: Source,
    /// Number of Phase-1 results mentioning the entity.
    pub mention_count: u32,
    /// Sum of engagement totals across those results.
    pub aggregate_engagement: u64,
    /// Ordinal of the first mention, for deterministic ordering.
    #[serde(skip)]
    pub first_seen: usize,
}

/// What a search request is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryScope {
    /// The topic alone.
    Topic,
    /// Items by a given author that mention the topic.
    Author(String),
    /// Items from a given community that mention the topic.
    Community(String),
}

/// Ordering preference for scoped requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Backend-defined relevance.
    Relevance,
    /// Newest first.
    Recent,
    /// Most engaged first.
    Top,
}

/// A single backend search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Normalised query terms.
    pub query: String,
    /// Lookback window in days.
    pub lookback_days: u32,
    /// Maximum number of records wanted.
    pub limit: usize,
    /// Optional author / community restriction.
    pub scope: QueryScope,
    /// Ordering preference.
    pub sort: SortOrder,
}

impl SearchRequest {
    /// A broad topic request.
    pub fn topic(query: impl Into<String>, lookback_days: u32, limit: usize) -> Self {
        Self {
            query: query.into(),
            lookback_days,
            limit,
            scope: QueryScope::Topic,
            sort: SortOrder::Relevance,
        }
    }

    /// Same request with a different query string.
    pub fn with_query(&self, query: &str) -> Self {
        Self {
            query: query.to_owned(),
            ..self.clone()
        }
    }

    /// Same request with a different limit.
    pub fn with_limit(&self, limit: usize) -> Self {
        Self {
            limit,
            ..self.clone()
        }
    }
}
