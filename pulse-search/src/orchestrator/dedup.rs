//! Result deduplication by `(source, origin_id)`.
//!
//! Phase-1 results always win over Phase-2 duplicates. Within one phase the
//! entry with verified engagement wins, then the one with more engagement,
//! then the one seen first. Missing author or community on the winner is
//! filled from the dropped duplicate. Running it twice changes nothing.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{SearchResult, Source};

/// Deduplicate results, keeping first-seen order of the surviving keys.
pub fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut index: HashMap<(Source, String), usize> = HashMap::new();
    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());

    for result in results {
        let key = (result.source, result.origin_id.clone());
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut kept[i];
                if preference(&result, existing) == Ordering::Greater {
                    let loser = std::mem::replace(existing, result);
                    fill_gaps(existing, loser);
                } else {
                    fill_gaps(existing, result);
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(result);
            }
        }
    }

    kept
}

/// `Greater` when `a` should replace `b`.
fn preference(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.phase
        .cmp(&a.phase)
        .then_with(|| a.engagement_verified.cmp(&b.engagement_verified))
        .then_with(|| a.engagement.total().cmp(&b.engagement.total()))
}

fn fill_gaps(winner: &mut SearchResult, loser: SearchResult) {
    if winner.author.is_none() {
        winner.author = loser.author;
    }
    if winner.community.is_none() {
        winner.community = loser.community;
    }
}
