//! Research orchestrator: two-phase fan-out, dedup, scoring, ranking.
//!
//! This module queries every reachable backend concurrently, follows up on
//! recurring authors and communities with scoped queries, deduplicates by
//! canonical origin id, scores each result on recency, relevance and
//! engagement, and returns ranked, truncated per-source lists.

pub mod dedup;
pub mod normalize;
pub mod origin;
pub mod scoring;
pub mod search;
pub mod supplemental;

pub use normalize::LookbackWindow;
pub use search::Orchestrator;
