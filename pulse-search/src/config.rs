//! Research configuration with sensible defaults.
//!
//! [`SearchConfig`] controls depth, lookback window, timeouts, scoring
//! weights and backend endpoints. Depth tiers are bundles of result-count
//! ceilings described by [`DepthProfile`]; they bound cost and latency and
//! are treated as plain inputs by the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::Source;

/// Default primary model for the forum model-search transport.
pub const DEFAULT_FORUM_MODEL: &str = "gpt-5.2";

/// Models tried in order after the primary one is refused, newest first.
pub const FORUM_MODEL_FALLBACKS: &[&str] = &["gpt-5.2", "gpt-5.1", "gpt-5", "gpt-4.1", "gpt-4o"];

/// Default model for the social API transport.
pub const DEFAULT_SOCIAL_MODEL: &str = "grok-4-1-fast";

/// Longest supported lookback window.
pub const MAX_LOOKBACK_DAYS: u32 = 30;

/// Ceiling for externally supplied web results.
pub const WEB_RESULT_CEILING: usize = 15;

/// Research depth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Small ceilings, no supplemental pass.
    Quick,
    /// Medium ceilings, small supplemental pass.
    #[default]
    Default,
    /// Large ceilings, expanded supplemental pass.
    Deep,
}

impl Depth {
    /// Returns the ceilings and Phase-2 budget for this tier.
    pub fn profile(&self) -> DepthProfile {
        match self {
            Self::Quick => DepthProfile {
                forum_limit: 12,
                social_limit: 12,
                phase_two: false,
                entities_per_kind: 0,
                results_per_scoped_query: 0,
                queries_per_entity: 0,
            },
            Self::Default => DepthProfile {
                forum_limit: 30,
                social_limit: 30,
                phase_two: true,
                entities_per_kind: 3,
                results_per_scoped_query: 3,
                queries_per_entity: 1,
            },
            Self::Deep => DepthProfile {
                forum_limit: 70,
                social_limit: 60,
                phase_two: true,
                entities_per_kind: 5,
                results_per_scoped_query: 5,
                queries_per_entity: 2,
            },
        }
    }

    /// Returns the lowercase name of this tier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Default => "default",
            Self::Deep => "deep",
        }
    }
}

/// Result ceilings and supplemental-search budget of a depth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthProfile {
    /// Per-request and final-list ceiling for the forum source.
    pub forum_limit: usize,
    /// Per-request and final-list ceiling for the social source.
    pub social_limit: usize,
    /// Whether the entity-driven second pass runs.
    pub phase_two: bool,
    /// Entities promoted per kind.
    pub entities_per_kind: usize,
    /// Result limit of each scoped Phase-2 request.
    pub results_per_scoped_query: usize,
    /// Scoped query variants issued per entity.
    pub queries_per_entity: usize,
}

impl DepthProfile {
    /// Ceiling for a source's final list.
    pub fn ceiling(&self, source: Source) -> usize {
        match source {
            Source::Forum => self.forum_limit,
            Source::Social => self.social_limit,
            Source::Web => WEB_RESULT_CEILING,
        }
    }
}

/// Which backends the caller allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFilter {
    /// Whatever is reachable.
    #[default]
    Auto,
    /// Forum backend only.
    Forum,
    /// Social backend only.
    Social,
}

impl SourceFilter {
    /// Whether this filter lets a source through.
    pub fn allows(&self, source: Source) -> bool {
        match self {
            Self::Auto => true,
            Self::Forum => source == Source::Forum,
            Self::Social => source == Source::Social,
        }
    }
}

/// Weights of the three score components; expected to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Newer is better.
    pub recency: f64,
    /// Query-term overlap.
    pub relevance: f64,
    /// Log-scaled popularity, relative to the source.
    pub engagement: f64,
}

impl Weights {
    fn sum(&self) -> f64 {
        self.recency + self.relevance + self.engagement
    }

    fn any_negative(&self) -> bool {
        self.recency < 0.0 || self.relevance < 0.0 || self.engagement < 0.0
    }
}

/// Scoring weights per source family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Forum and social results, which carry engagement signals.
    pub community: Weights,
    /// Web results, which do not.
    pub web: Weights,
}

impl ScoringWeights {
    /// Weights applicable to a source.
    pub fn for_source(&self, source: Source) -> Weights {
        match source {
            Source::Forum | Source::Social => self.community,
            Source::Web => self.web,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            community: Weights {
                recency: 0.25,
                relevance: 0.30,
                engagement: 0.45,
            },
            web: Weights {
                recency: 0.35,
                relevance: 0.65,
                engagement: 0.0,
            },
        }
    }
}

/// Promotion threshold for extracted entities. Either bound qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityThreshold {
    /// Minimum Phase-1 mentions.
    pub min_mentions: u32,
    /// Minimum summed engagement.
    pub min_engagement: u64,
}

impl Default for EntityThreshold {
    fn default() -> Self {
        Self {
            min_mentions: 2,
            min_engagement: 100,
        }
    }
}

/// How the forum transport chooses its primary model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPolicy {
    /// Ask the model API for the newest mainline model, then fall back.
    #[default]
    Auto,
    /// Use the configured model as primary without a lookup.
    Pinned,
}

/// Parse a model alias map.
///
/// Accepts a JSON object (`{"gpt-5": "gpt-5-2025-08-07"}`) or a list of
/// `alias=model` pairs separated by `,` or `;`. Malformed entries are skipped.
pub fn parse_model_map(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    if raw.starts_with('{') {
        return serde_json::from_str::<BTreeMap<String, String>>(raw).unwrap_or_default();
    }
    raw.split([',', ';'])
        .filter_map(|pair| {
            let (alias, model) = pair.split_once('=')?;
            let (alias, model) = (alias.trim(), model.trim());
            (!alias.is_empty() && !model.is_empty()).then(|| (alias.to_owned(), model.to_owned()))
        })
        .collect()
}

/// Forum backend endpoints and models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumSettings {
    /// Use the unauthenticated public listing as the free transport.
    pub public_search: bool,
    /// Base URL of the public listing and thread lookups.
    pub listing_base_url: String,
    /// Base URL of the model API.
    pub api_base_url: String,
    /// Primary model for model search.
    pub model: String,
    /// Models tried after the primary is refused.
    pub fallback_models: Vec<String>,
    /// Whether the primary model is looked up or taken as configured.
    pub policy: ModelPolicy,
    /// Aliases applied to every model name before it is sent.
    pub model_map: BTreeMap<String, String>,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self {
            public_search: false,
            listing_base_url: "https://www.reddit.com".into(),
            api_base_url: "https://api.openai.com/v1".into(),
            model: DEFAULT_FORUM_MODEL.into(),
            fallback_models: FORUM_MODEL_FALLBACKS.iter().map(|m| (*m).to_owned()).collect(),
            policy: ModelPolicy::Auto,
            model_map: BTreeMap::new(),
        }
    }
}

impl ForumSettings {
    /// Apply the alias map to a model name.
    pub fn map_model(&self, model: &str) -> String {
        self.model_map.get(model).cloned().unwrap_or_else(|| model.to_owned())
    }

    /// A model chain starting at `primary`, then the fallbacks, aliased and
    /// without repeats.
    pub fn chain_from(&self, primary: &str) -> Vec<String> {
        let mut chain: Vec<String> = Vec::with_capacity(self.fallback_models.len() + 1);
        for model in std::iter::once(primary).chain(self.fallback_models.iter().map(String::as_str)) {
            let model = self.map_model(model);
            if !chain.contains(&model) {
                chain.push(model);
            }
        }
        chain
    }

    /// The configured model chain: primary first, then fallbacks.
    pub fn model_chain(&self) -> Vec<String> {
        self.chain_from(&self.model)
    }
}

/// Social backend endpoints and models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialSettings {
    /// Name or path of the local helper program.
    pub cli_program: String,
    /// Base URL of the social search API.
    pub api_base_url: String,
    /// Model for the social search API.
    pub model: String,
    /// Aliases applied to the model name before it is sent.
    pub model_map: BTreeMap<String, String>,
}

impl Default for SocialSettings {
    fn default() -> Self {
        Self {
            cli_program: "bird".into(),
            api_base_url: "https://api.x.ai/v1".into(),
            model: DEFAULT_SOCIAL_MODEL.into(),
            model_map: BTreeMap::new(),
        }
    }
}

impl SocialSettings {
    /// The model actually sent: `latest` and `stable` name the default
    /// model, then the alias map applies.
    pub fn resolved_model(&self) -> String {
        let model = match self.model.trim() {
            "" | "latest" | "stable" => DEFAULT_SOCIAL_MODEL,
            other => other,
        };
        self.model_map.get(model).cloned().unwrap_or_else(|| model.to_owned())
    }
}

/// Configuration for one research session.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Depth tier.
    pub depth: Depth,
    /// Lookback window in days (1..=30).
    pub lookback_days: u32,
    /// Which backends the caller allows.
    pub sources: SourceFilter,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Overall session deadline in seconds.
    pub session_timeout_seconds: u64,
    /// Whether a session with no reachable backend may still succeed by
    /// delegating to the external web search.
    pub allow_web_fallback: bool,
    /// Ask the consumer for external web results even when every backend
    /// is reachable.
    pub include_web: bool,
    /// Score component weights.
    pub weights: ScoringWeights,
    /// Entity promotion threshold.
    pub entity_threshold: EntityThreshold,
    /// Concurrent scoped queries per backend in Phase 2.
    pub phase_two_concurrency: usize,
    /// Concurrent engagement lookups.
    pub enrich_concurrency: usize,
    /// Random delay range `(min, max)` in milliseconds before each
    /// engagement lookup.
    pub enrich_delay_ms: (u64, u64),
    /// Forum backend settings.
    pub forum: ForumSettings,
    /// Social backend settings.
    pub social: SocialSettings,
    /// User-Agent sent to the public forum endpoints.
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: Depth::Default,
            lookback_days: MAX_LOOKBACK_DAYS,
            sources: SourceFilter::Auto,
            timeout_seconds: 120,
            session_timeout_seconds: 300,
            allow_web_fallback: true,
            include_web: false,
            weights: ScoringWeights::default(),
            entity_threshold: EntityThreshold::default(),
            phase_two_concurrency: 2,
            enrich_concurrency: 4,
            enrich_delay_ms: (50, 250),
            forum: ForumSettings::default(),
            social: SocialSettings::default(),
            user_agent: concat!("pulse-search/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.lookback_days == 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SearchError::Config(format!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}"
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.session_timeout_seconds < self.timeout_seconds {
            return Err(SearchError::Config(
                "session_timeout_seconds must be >= timeout_seconds".into(),
            ));
        }
        if self.phase_two_concurrency == 0 || self.enrich_concurrency == 0 {
            return Err(SearchError::Config(
                "concurrency limits must be greater than 0".into(),
            ));
        }
        if self.enrich_delay_ms.0 > self.enrich_delay_ms.1 {
            return Err(SearchError::Config(
                "enrich_delay_ms min must be <= max".into(),
            ));
        }
        for weights in [self.weights.community, self.weights.web] {
            if weights.any_negative() || (weights.sum() - 1.0).abs() > 1e-6 {
                return Err(SearchError::Config(
                    "score weights must be non-negative and sum to 1".into(),
                ));
            }
        }
        if self.forum.model.trim().is_empty() {
            return Err(SearchError::Config("forum model must not be empty".into()));
        }
        Ok(())
    }

    /// Ceilings and Phase-2 budget of the configured depth.
    pub fn profile(&self) -> DepthProfile {
        self.depth.profile()
    }
}
