//! Phase-2 supplemental search.
//!
//! [`plan_supplemental`] turns promoted entities into scoped queries: each
//! entity is searched on the backend it was seen on, once per sort variant
//! allowed by the depth tier. Planning is pure so it can be tested without
//! any backend. [`run_supplemental`] executes a plan with backends in
//! parallel and bounded concurrency within each backend.

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::backend::BackendClient;
use crate::capability::Mode;
use crate::config::DepthProfile;
use crate::query::QueryPlan;
use crate::types::{Entity, EntityKind, QueryScope, RawRecord, SearchRequest, SortOrder, Source};

/// Sort variants in the order they are added as depth grows.
const VARIANTS: &[SortOrder] = &[SortOrder::Recent, SortOrder::Top];

/// One planned entity-scoped query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    /// Backend the query goes to.
    pub source: Source,
    /// Entity being followed up.
    pub entity: String,
    /// Request to send; its query is replaced by each plan candidate in turn.
    pub request: SearchRequest,
}

/// Outcome of executing a plan on one backend.
#[derive(Debug, Clone, Default)]
pub struct SupplementalBatch {
    /// Records returned across the backend's scoped queries.
    pub records: Vec<RawRecord>,
    /// Queries issued.
    pub issued: usize,
    /// Queries that failed or ran past the deadline.
    pub failed: usize,
}

/// Plan the supplemental pass.
///
/// Returns nothing when the tier has no Phase 2 or no entity was promoted.
/// Entities whose backend is absent from `mode` are skipped.
pub fn plan_supplemental(
    entities: &[Entity],
    plan: &QueryPlan,
    profile: &DepthProfile,
    mode: &Mode,
    lookback_days: u32,
) -> Vec<ScopedQuery> {
    if !profile.phase_two || profile.results_per_scoped_query == 0 {
        return Vec::new();
    }

    let variants = &VARIANTS[..profile.queries_per_entity.min(VARIANTS.len())];
    let mut queries = Vec::new();

    for entity in entities {
        if !mode.reaches(entity.source) {
            continue;
        }
        let scope = match entity.kind {
            EntityKind::Author => QueryScope::Author(entity.identifier.clone()),
            EntityKind::Community if entity.source == Source::Forum => {
                QueryScope::Community(entity.identifier.clone())
            }
            EntityKind::Community => continue,
        };
        for sort in variants {
            queries.push(ScopedQuery {
                source: entity.source,
                entity: entity.identifier.clone(),
                request: SearchRequest {
                    query: plan.primary().to_owned(),
                    lookback_days,
                    limit: profile.results_per_scoped_query,
                    scope: scope.clone(),
                    sort: *sort,
                },
            });
        }
    }

    tracing::debug!(count = queries.len(), "supplemental queries planned");
    queries
}

/// Execute a plan. Each backend runs its queries with at most
/// `concurrency` in flight; backends run in parallel. Per-query failures
/// are logged and dropped. Queries still running at `deadline` count as
/// failed.
pub async fn run_supplemental(
    queries: Vec<ScopedQuery>,
    clients: &[BackendClient],
    plan: &QueryPlan,
    concurrency: usize,
    deadline: Instant,
) -> Vec<(Source, SupplementalBatch)> {
    let per_backend = clients.iter().filter_map(|client| {
        let mine: Vec<ScopedQuery> = queries
            .iter()
            .filter(|q| q.source == client.source())
            .cloned()
            .collect();
        (!mine.is_empty()).then(|| run_backend(client, mine, plan, concurrency, deadline))
    });

    join_all(per_backend).await
}

async fn run_backend(
    client: &BackendClient,
    queries: Vec<ScopedQuery>,
    plan: &QueryPlan,
    concurrency: usize,
    deadline: Instant,
) -> (Source, SupplementalBatch) {
    let source = client.source();
    let issued = queries.len();

    let outcomes: Vec<Option<Vec<RawRecord>>> = stream::iter(queries)
        .map(|query| async move {
            let search = client.search_candidates(&query.request, plan.attempts());
            match tokio::time::timeout_at(deadline, search).await {
                Ok(Ok(records)) => Some(records),
                Ok(Err(err)) => {
                    tracing::warn!(%source, entity = %query.entity, error = %err, "supplemental query failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(%source, entity = %query.entity, "supplemental query hit session deadline");
                    None
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut batch = SupplementalBatch {
        issued,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            Some(records) => batch.records.extend(records),
            None => batch.failed += 1,
        }
    }
    (source, batch)
}
