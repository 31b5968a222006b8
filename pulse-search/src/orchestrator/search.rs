//! Core research orchestrator: two-phase fan-out, merge, score, rank.
//!
//! # Pipeline
//!
//! 1. Normalise the topic into a [`crate::query::QueryPlan`]
//! 2. Phase 1: every reachable backend concurrently
//!    ([`futures::future::join_all`]), each under the session deadline
//! 3. Enrich forum engagement
//! 4. Normalise records, applying the lookback window
//! 5. Extract and promote entities from Phase-1 results
//! 6. Phase 2: entity-scoped queries, grouped per backend
//! 7. Merge in externally gathered web results
//! 8. Per source: deduplicate, score, rank, truncate to the tier ceiling
//!
//! Phase 2 never starts before Phase 1 has finished. Each backend writes
//! only its own slot, so a late or failed backend never discards another
//! backend's results.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::backend::BackendClient;
use crate::capability::{Mode, ModeKind};
use crate::config::SearchConfig;
use crate::enrich::{Enricher, EnrichmentStats};
use crate::entities::{extract_entities, most_mentioned};
use crate::error::{BackendError, SearchError};
use crate::query::{self, QueryPlan};
use crate::session::{ResearchSession, SessionStats, SourceStats, SourceStatus};
use crate::types::{Phase, QueryScope, RawRecord, SearchRequest, SearchResult, Source};

use super::dedup::deduplicate;
use super::normalize::{normalize_records, LookbackWindow};
use super::scoring::{rank, score_results, ScoreContext};
use super::supplemental::{plan_supplemental, run_supplemental};

/// Entities listed in the digest when the tier has no Phase 2.
const DIGEST_ENTITIES_PER_KIND: usize = 3;

/// Length of the most-mentioned list in the session stats.
const MOST_MENTIONED_LIMIT: usize = 5;

/// Runs research sessions over a fixed set of backend clients.
///
/// Clients for sources the [`Mode`] does not reach are discarded, so an
/// unreachable backend is never queried.
pub struct Orchestrator {
    config: SearchConfig,
    mode: Mode,
    clients: Vec<BackendClient>,
    enricher: Option<Enricher>,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(config: SearchConfig, mode: Mode, clients: Vec<BackendClient>) -> Self {
        let clients = clients
            .into_iter()
            .filter(|c| mode.reaches(c.source()))
            .collect();
        Self {
            config,
            mode,
            clients,
            enricher: None,
        }
    }

    /// Enable forum engagement enrichment.
    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// The session mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Run one research session.
    ///
    /// `web_results` are results the consumer gathered with its own web
    /// search; they are filtered, scored and ranked like everything else.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Config`] for an invalid config or an empty topic
    /// - [`SearchError::NoUsableBackend`] when no backend is reachable, no
    ///   web results were supplied and the web fallback is disabled
    pub async fn run(
        &self,
        topic: &str,
        web_results: Vec<RawRecord>,
    ) -> Result<ResearchSession, SearchError> {
        self.config.validate()?;
        let started = Instant::now();

        let plan = query::normalize(topic);
        if plan.candidates.is_empty() {
            return Err(SearchError::Config("topic must not be empty".into()));
        }

        if self.mode.kind() == ModeKind::WebOnly
            && !self.config.allow_web_fallback
            && web_results.is_empty()
        {
            return Err(SearchError::NoUsableBackend(
                "no forum or social backend is configured and web fallback is disabled".into(),
            ));
        }

        let profile = self.config.profile();
        let window = LookbackWindow::ending_at(Utc::now(), self.config.lookback_days);
        let deadline = started + Duration::from_secs(self.config.session_timeout_seconds);
        tracing::info!(
            query = plan.primary(),
            depth = self.config.depth.name(),
            mode = %self.mode.kind(),
            days = self.config.lookback_days,
            "research session started"
        );

        // Phase 1
        let mut primary = self.run_primary(&plan, deadline).await;
        let mut stats = SessionStats::default();
        let mut enrichment = self.enrich(primary.values_mut(), deadline).await;

        let mut phase_one: BTreeMap<Source, Vec<SearchResult>> = BTreeMap::new();
        let mut status: BTreeMap<Source, SourceStatus> = BTreeMap::new();
        for (source, outcome) in primary {
            let entry = stats.sources.entry(source).or_default();
            match outcome {
                Ok(records) => {
                    entry.primary_records = records.len();
                    phase_one.insert(source, normalize_records(records, &window, Phase::Primary));
                }
                Err(err) => {
                    status.insert(source, SourceStatus::Degraded { reason: err.to_string() });
                    phase_one.insert(source, Vec::new());
                }
            }
        }

        // Entities
        let all_primary: Vec<SearchResult> = phase_one.values().flatten().cloned().collect();
        let per_kind = if profile.phase_two {
            profile.entities_per_kind
        } else {
            DIGEST_ENTITIES_PER_KIND
        };
        let entities = extract_entities(&all_primary, &self.config.entity_threshold, per_kind);

        // Phase 2
        let queries = plan_supplemental(
            &entities,
            &plan,
            &profile,
            &self.mode,
            self.config.lookback_days,
        );
        let mut phase_two: BTreeMap<Source, Vec<SearchResult>> = BTreeMap::new();
        if !queries.is_empty() {
            let batches = run_supplemental(
                queries,
                &self.clients,
                &plan,
                self.config.phase_two_concurrency,
                deadline,
            )
            .await;
            let mut batches: Vec<(Source, Vec<RawRecord>, SourceStats)> = batches
                .into_iter()
                .map(|(source, batch)| {
                    let counts = SourceStats {
                        supplemental_records: batch.records.len(),
                        supplemental_queries: batch.issued,
                        supplemental_failures: batch.failed,
                        ..Default::default()
                    };
                    (source, batch.records, counts)
                })
                .collect();
            let extra = self
                .enrich(batches.iter_mut().map(|(_, records, _)| records), deadline)
                .await;
            enrichment = merge_enrichment(enrichment, extra);

            for (source, records, counts) in batches {
                let entry = stats.sources.entry(source).or_default();
                entry.supplemental_records = counts.supplemental_records;
                entry.supplemental_queries = counts.supplemental_queries;
                entry.supplemental_failures = counts.supplemental_failures;
                phase_two.insert(source, normalize_records(records, &window, Phase::Supplemental));
            }
        }

        // Web
        let web_supplied = !web_results.is_empty();
        if web_supplied {
            let web: Vec<RawRecord> = web_results
                .into_iter()
                .map(|mut r| {
                    r.source = Source::Web;
                    r
                })
                .collect();
            stats.sources.entry(Source::Web).or_default().primary_records = web.len();
            phase_one.insert(Source::Web, normalize_records(web, &window, Phase::Primary));
        }

        // Merge, score, rank
        let now = Utc::now();
        let ctx = ScoreContext {
            terms: &plan.terms,
            lookback_days: self.config.lookback_days,
            now,
            weights: &self.config.weights,
        };
        let mut results: BTreeMap<Source, Vec<SearchResult>> = BTreeMap::new();
        for (source, mut merged) in phase_one {
            merged.extend(phase_two.remove(&source).unwrap_or_default());
            let mut merged = deduplicate(merged);
            score_results(&mut merged, &ctx);
            rank(&mut merged);
            merged.truncate(profile.ceiling(source));

            let entry = stats.sources.entry(source).or_default();
            entry.kept = merged.len();
            for result in &merged {
                entry.engagement.absorb(&result.engagement);
            }
            entry.total_engagement = entry.engagement.total();
            if !status.contains_key(&source) || !merged.is_empty() {
                let state = if merged.is_empty() {
                    SourceStatus::Empty
                } else {
                    SourceStatus::Contributed
                };
                status.insert(source, state);
            }
            results.insert(source, merged);
        }
        for source in Source::all() {
            status.entry(*source).or_insert(SourceStatus::Unavailable);
        }

        stats.enrichment = enrichment;
        stats.total_results = results.values().map(Vec::len).sum();
        stats.dated_results = results
            .values()
            .flatten()
            .filter(|r| !r.date_estimated)
            .count();
        stats.total_engagement = stats
            .sources
            .values()
            .fold(0u64, |acc, s| acc.saturating_add(s.total_engagement));
        stats.most_mentioned = most_mentioned(results.values().flatten(), MOST_MENTIONED_LIMIT);
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            total = stats.total_results,
            entities = entities.len(),
            elapsed_ms = stats.elapsed_ms,
            "research session finished"
        );

        Ok(ResearchSession {
            topic: plan.topic.clone(),
            plan,
            window,
            depth: self.config.depth,
            mode: self.mode.clone(),
            results,
            status,
            entities,
            stats,
            include_web: self.config.include_web,
        })
    }

    /// Broad search on every client, each bounded by the session deadline.
    async fn run_primary(
        &self,
        plan: &QueryPlan,
        deadline: Instant,
    ) -> BTreeMap<Source, Result<Vec<RawRecord>, BackendError>> {
        let profile = self.config.profile();
        let searches = self.clients.iter().map(|client| {
            let source = client.source();
            let request =
                SearchRequest::topic(plan.primary(), self.config.lookback_days, profile.ceiling(source));
            async move {
                let outcome = tokio::time::timeout_at(deadline, primary_search(client, &request, plan))
                    .await
                    .unwrap_or_else(|_| Err(BackendError::Timeout("session deadline reached".into())));
                match &outcome {
                    Ok(records) => tracing::debug!(%source, count = records.len(), "phase one complete"),
                    Err(err) => tracing::warn!(%source, error = %err, "phase one failed"),
                }
                (source, outcome)
            }
        });

        join_all(searches).await.into_iter().collect()
    }

    /// Enrich the forum record sets among `batches`, bounded by the
    /// deadline. Other sources pass through untouched.
    async fn enrich<'a, I, T>(&self, batches: I, deadline: Instant) -> EnrichmentStats
    where
        I: IntoIterator<Item = &'a mut T>,
        T: RecordSet + 'a,
    {
        let Some(enricher) = &self.enricher else {
            return EnrichmentStats::default();
        };

        let mut total = EnrichmentStats::default();
        for batch in batches {
            let Some(records) = batch.records_mut() else {
                continue;
            };
            if !records.iter().any(|r| r.source == Source::Forum) {
                continue;
            }
            match tokio::time::timeout_at(deadline, enricher.enrich(records)).await {
                Ok(stats) => total = merge_enrichment(total, stats),
                Err(_) => tracing::warn!("engagement enrichment hit session deadline"),
            }
        }
        total
    }
}

/// Topic search with query fallback. A forum search that finds nothing
/// gets one more try scoped to the guessed community; a failure there
/// leaves the empty result standing.
async fn primary_search(
    client: &BackendClient,
    request: &SearchRequest,
    plan: &QueryPlan,
) -> Result<Vec<RawRecord>, BackendError> {
    let records = client.search_candidates(request, plan.attempts()).await?;
    if !records.is_empty() || client.source() != Source::Forum {
        return Ok(records);
    }
    let Some(community) = plan.community_guess() else {
        return Ok(records);
    };
    tracing::debug!(%community, "no forum results, trying community guess");
    let guess = SearchRequest {
        scope: QueryScope::Community(community),
        ..request.with_query(plan.core())
    };
    match client.search(&guess).await {
        Ok(records) => Ok(records),
        Err(err) => {
            tracing::debug!(error = %err, "community guess failed");
            Ok(records)
        }
    }
}

/// Something holding a mutable record list, if it has one.
trait RecordSet {
    fn records_mut(&mut self) -> Option<&mut Vec<RawRecord>>;
}

impl RecordSet for Vec<RawRecord> {
    fn records_mut(&mut self) -> Option<&mut Vec<RawRecord>> {
        Some(self)
    }
}

impl RecordSet for Result<Vec<RawRecord>, BackendError> {
    fn records_mut(&mut self) -> Option<&mut Vec<RawRecord>> {
        self.as_mut().ok()
    }
}

fn merge_enrichment(a: EnrichmentStats, b: EnrichmentStats) -> EnrichmentStats {
    EnrichmentStats {
        attempted: a.attempted + b.attempted,
        enriched: a.enriched + b.enriched,
        missed: a.missed + b.missed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transport;

    #[tokio::test]
    async fn web_only_without_fallback_is_terminal() {
        let config = SearchConfig {
            allow_web_fallback: false,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(config, Mode::default(), Vec::new());
        let err = orchestrator.run("rust", Vec::new()).await.unwrap_err();
        assert!(matches!(err, SearchError::NoUsableBackend(_)));
    }

    #[tokio::test]
    async fn web_only_with_fallback_succeeds_empty() {
        let orchestrator = Orchestrator::new(SearchConfig::default(), Mode::default(), Vec::new());
        let session = orchestrator.run("rust", Vec::new()).await.expect("session");
        assert!(session.needs_external_search());
        assert_eq!(session.stats.total_results, 0);
        assert_eq!(session.status(Source::Forum), SourceStatus::Unavailable);
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let orchestrator = Orchestrator::new(SearchConfig::default(), Mode::default(), Vec::new());
        let err = orchestrator.run("  ", Vec::new()).await.unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = SearchConfig {
            lookback_days: 0,
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(config, Mode::default(), Vec::new());
        assert!(orchestrator.run("rust", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn supplied_web_results_are_ranked() {
        let orchestrator = Orchestrator::new(SearchConfig::default(), Mode::default(), Vec::new());
        let mut web = RawRecord::new(Source::Forum, "https://blog.example.com/rust", "Rust 2026 roadmap");
        web.timestamp = Some(Utc::now());
        let session = orchestrator.run("rust", vec![web]).await.expect("session");
        let results = session.results(Source::Web);
        assert_eq!(results.len(), 1);
        assert!(results[0].score.is_some());
        assert_eq!(session.status(Source::Web), SourceStatus::Contributed);
    }

    #[test]
    fn clients_outside_mode_are_dropped() {
        let client = BackendClient::new(Source::Social, Vec::new(), Duration::from_secs(1));
        let mode = Mode::new(vec![Transport::ModelSearch], vec![]);
        let orchestrator = Orchestrator::new(SearchConfig::default(), mode, vec![client]);
        assert!(orchestrator.clients.is_empty());
    }
}
