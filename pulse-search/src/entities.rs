//! Entity extraction from Phase-1 results.
//!
//! Purely structural: authors and forum communities are counted across the
//! broad-search results. Entities that recur, or that attract a lot of
//! engagement, seed the narrower Phase-2 queries.

use std::collections::HashMap;

use crate::backends::strip_handle;
use crate::config::EntityThreshold;
use crate::types::{Entity, EntityKind, Phase, SearchResult, Source};

/// Author names that are placeholders or automation, never real voices.
const IGNORED_AUTHORS: &[&str] = &[
    "[deleted]",
    "[removed]",
    "deleted",
    "automoderator",
    "autotldr",
    "remindmebot",
    "savevideo",
];

/// Aggregate every author and community mentioned by Phase-1 results.
///
/// Identifiers compare case-insensitively with `@` / `u/` / `r/` prefixes
/// removed; the first spelling seen is kept. Output is in first-seen order.
pub fn extract(results: &[SearchResult]) -> Vec<Entity> {
    tally(results.iter().filter(|r| r.phase == Phase::Primary))
}

/// The `n` entities named by the most results of either phase, ties broken
/// by engagement and then first appearance. No threshold applies.
pub fn most_mentioned<'a, I>(results: I, n: usize) -> Vec<Entity>
where
    I: IntoIterator<Item = &'a SearchResult>,
{
    let mut entities = tally(results.into_iter());
    entities.sort_by(|a, b| {
        b.mention_count
            .cmp(&a.mention_count)
            .then_with(|| b.aggregate_engagement.cmp(&a.aggregate_engagement))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
    entities.truncate(n);
    entities
}

fn tally<'a>(results: impl Iterator<Item = &'a SearchResult>) -> Vec<Entity> {
    let mut index: HashMap<(EntityKind, Source, String), usize> = HashMap::new();
    let mut entities: Vec<Entity> = Vec::new();

    let mut mention = |kind: EntityKind, source: Source, raw: &str, engagement: u64| {
        let identifier = strip_handle(raw);
        let key_name = identifier.to_lowercase();
        if identifier.is_empty()
            || (kind == EntityKind::Author && IGNORED_AUTHORS.contains(&key_name.as_str()))
        {
            return;
        }
        let key = (kind, source, key_name);
        match index.get(&key) {
            Some(&i) => {
                let entity = &mut entities[i];
                entity.mention_count = entity.mention_count.saturating_add(1);
                entity.aggregate_engagement = entity.aggregate_engagement.saturating_add(engagement);
            }
            None => {
                let first_seen = entities.len();
                index.insert(key, first_seen);
                entities.push(Entity {
                    kind,
                    identifier,
                    source,
                    mention_count: 1,
                    aggregate_engagement: engagement,
                    first_seen,
                });
            }
        }
    };

    for result in results {
        let engagement = result.engagement.total();
        if let Some(author) = &result.author {
            mention(EntityKind::Author, result.source, author, engagement);
        }
        if result.source == Source::Forum {
            if let Some(community) = &result.community {
                mention(EntityKind::Community, result.source, community, engagement);
            }
        }
    }

    entities
}

/// Keep entities meeting the threshold, at most `per_kind` of each kind,
/// ranked by engagement, then mentions, then first appearance.
pub fn promote(candidates: Vec<Entity>, threshold: &EntityThreshold, per_kind: usize) -> Vec<Entity> {
    let mut qualified: Vec<Entity> = candidates
        .into_iter()
        .filter(|e| {
            e.mention_count >= threshold.min_mentions
                || e.aggregate_engagement >= threshold.min_engagement
        })
        .collect();

    qualified.sort_by(|a, b| {
        b.aggregate_engagement
            .cmp(&a.aggregate_engagement)
            .then_with(|| b.mention_count.cmp(&a.mention_count))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });

    let mut taken: HashMap<EntityKind, usize> = HashMap::new();
    qualified
        .into_iter()
        .filter(|e| {
            let count = taken.entry(e.kind).or_default();
            if *count < per_kind {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Extract and promote in one step.
pub fn extract_entities(
    results: &[SearchResult],
    threshold: &EntityThreshold,
    per_kind: usize,
) -> Vec<Entity> {
    let promoted = promote(extract(results), threshold, per_kind);
    tracing::debug!(count = promoted.len(), "entities promoted");
    promoted
}
