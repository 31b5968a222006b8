//! The in-memory record of one research run.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::capability::Mode;
use crate::config::Depth;
use crate::enrich::EnrichmentStats;
use crate::orchestrator::normalize::LookbackWindow;
use crate::query::QueryPlan;
use crate::types::{Engagement, Entity, SearchResult, Source};

/// How a source fared in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Searched and produced at least one result.
    Contributed,
    /// Searched successfully, nothing in the window.
    Empty,
    /// Searched, but the primary pass failed.
    Degraded {
        /// What went wrong.
        reason: String,
    },
    /// Not reachable in this session.
    Unavailable,
}

impl SourceStatus {
    /// Whether the source supplied results.
    pub fn contributed(&self) -> bool {
        matches!(self, Self::Contributed)
    }
}

/// Per-source counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Records returned by the broad search.
    pub primary_records: usize,
    /// Records returned by scoped queries.
    pub supplemental_records: usize,
    /// Scoped queries issued.
    pub supplemental_queries: usize,
    /// Scoped queries that failed.
    pub supplemental_failures: usize,
    /// Results left after window filter, dedup and truncation.
    pub kept: usize,
    /// Engagement counters summed over the kept results.
    pub engagement: Engagement,
    /// Sum of every engagement counter over the kept results.
    pub total_engagement: u64,
}

/// Session-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Counters by source.
    pub sources: BTreeMap<Source, SourceStats>,
    /// Engagement lookups.
    pub enrichment: EnrichmentStats,
    /// Results across all sources.
    pub total_results: usize,
    /// Results dated inside the window (not estimated).
    pub dated_results: usize,
    /// Engagement summed over every kept result.
    pub total_engagement: u64,
    /// Authors and communities named most often by the kept results.
    pub most_mentioned: Vec<Entity>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Everything a research run produced. Never persisted.
#[derive(Debug, Clone)]
pub struct ResearchSession {
    /// Topic as given.
    pub topic: String,
    /// Normalised query terms and candidates.
    pub plan: QueryPlan,
    /// Lookback window.
    pub window: LookbackWindow,
    /// Depth tier.
    pub depth: Depth,
    /// Reachable backends and their transport chains.
    pub mode: Mode,
    /// Ranked results per source.
    pub results: BTreeMap<Source, Vec<SearchResult>>,
    /// Outcome per source.
    pub status: BTreeMap<Source, SourceStatus>,
    /// Promoted entities.
    pub entities: Vec<Entity>,
    /// Counters.
    pub stats: SessionStats,
    /// External web search was requested explicitly.
    pub include_web: bool,
}

impl ResearchSession {
    /// Ranked results of a source; empty when the source did not run.
    pub fn results(&self, source: Source) -> &[SearchResult] {
        self.results.get(&source).map(Vec::as_slice).unwrap_or_default()
    }

    /// Status of a source.
    pub fn status(&self, source: Source) -> SourceStatus {
        self.status
            .get(&source)
            .cloned()
            .unwrap_or(SourceStatus::Unavailable)
    }

    /// Whether the consumer should run its own web search: some backend is
    /// missing from the mode, or it was asked for explicitly.
    pub fn needs_external_search(&self) -> bool {
        self.include_web || self.mode.sources().len() < 2
    }

    /// Every reachable backend failed and nothing came back.
    pub fn is_total_failure(&self) -> bool {
        let sources = self.mode.sources();
        !sources.is_empty()
            && sources
                .iter()
                .all(|s| matches!(self.status(*s), SourceStatus::Degraded { .. }))
            && self.stats.total_results == 0
    }
}
