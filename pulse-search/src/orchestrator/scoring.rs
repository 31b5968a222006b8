//! Composite scoring and ranking.
//!
//! Every result gets three components in `[0, 1]`:
//!
//! ```text
//! recency    = exp(-age_days / (lookback_days / 3))
//! relevance  = |query terms found in text| / |query terms|
//! engagement = ln(1 + total) / ln(1 + max total within the same source)
//! score      = w_recency * recency + w_relevance * relevance + w_engagement * engagement
//! ```
//!
//! Weights come from [`ScoringWeights`] and sum to 1, so the score stays in
//! `[0, 1]`. Web results use their own weights since they carry no
//! engagement.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::ScoringWeights;
use crate::query::tokenize;
use crate::types::{SearchResult, Source};

/// Inputs shared by every score in a session.
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    /// Lowercase query terms.
    pub terms: &'a [String],
    /// Lookback window in days.
    pub lookback_days: u32,
    /// Reference instant for ages.
    pub now: DateTime<Utc>,
    /// Component weights.
    pub weights: &'a ScoringWeights,
}

/// Exponential decay over the window; a third of the window is one time
/// constant.
pub fn recency(timestamp: DateTime<Utc>, now: DateTime<Utc>, lookback_days: u32) -> f64 {
    let age_days = ((now - timestamp).num_seconds() as f64 / 86_400.0).max(0.0);
    let tau = f64::from(lookback_days.max(1)) / 3.0;
    (-age_days / tau).exp().clamp(0.0, 1.0)
}

/// Fraction of query terms present in the text.
pub fn relevance(terms: &[String], text: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = terms.iter().filter(|t| tokens.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

/// Log-scaled engagement relative to the busiest item of the source.
pub fn engagement(total: u64, max_total: u64) -> f64 {
    if max_total == 0 {
        return 0.0;
    }
    ((1.0 + total as f64).ln() / (1.0 + max_total as f64).ln()).clamp(0.0, 1.0)
}

/// Score every result in place.
pub fn score_results(results: &mut [SearchResult], ctx: &ScoreContext<'_>) {
    let mut max_by_source: HashMap<Source, u64> = HashMap::new();
    for result in results.iter() {
        let max = max_by_source.entry(result.source).or_default();
        *max = (*max).max(result.engagement.total());
    }

    for result in results.iter_mut() {
        let weights = ctx.weights.for_source(result.source);
        let max = max_by_source.get(&result.source).copied().unwrap_or(0);
        let score = weights.recency * recency(result.timestamp, ctx.now, ctx.lookback_days)
            + weights.relevance * relevance(ctx.terms, &result.text)
            + weights.engagement * engagement(result.engagement.total(), max);
        result.score = Some(score.clamp(0.0, 1.0));
    }
}

/// Sort by score (descending), then newer first, then `origin_id`.
pub fn rank(results: &mut [SearchResult]) {
    results.sort_by(compare);
}

fn compare(a: &SearchResult, b: &SearchResult) -> Ordering {
    let score_a = a.score.unwrap_or(0.0);
    let score_b = b.score.unwrap_or(0.0);
    score_b
        .total_cmp(&score_a)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| a.origin_id.cmp(&b.origin_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Engagement, Phase};
    use chrono::Duration;

    fn make(id: &str, source: Source, text: &str, age_days: i64, likes: u64, now: DateTime<Utc>) -> SearchResult {
        SearchResult {
            source,
            origin_id: id.into(),
            url: format!("https://example.com/{id}"),
            author: None,
            community: None,
            text: text.into(),
            timestamp: now - Duration::days(age_days),
            date_estimated: false,
            engagement: Engagement::new().with("likes", likes),
            engagement_verified: true,
            score: None,
            phase: Phase::Primary,
        }
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    #[test]
    fn recency_decays() {
        let now = Utc::now();
        assert!((recency(now, now, 30) - 1.0).abs() < 1e-9);
        let ten = recency(now - Duration::days(10), now, 30);
        assert!((ten - (-1.0f64).exp()).abs() < 1e-6);
        assert!(recency(now - Duration::days(29), now, 30) < ten);
        assert!((recency(now + Duration::days(1), now, 30) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn relevance_counts_matching_terms() {
        let t = terms(&["vibe", "motion"]);
        assert!((relevance(&t, "Vibe Motion is great") - 1.0).abs() < 1e-9);
        assert!((relevance(&t, "vibe check") - 0.5).abs() < 1e-9);
        assert!(relevance(&t, "unrelated").abs() < 1e-9);
        assert!(relevance(&[], "anything").abs() < 1e-9);
    }

    #[test]
    fn engagement_is_relative_and_log_scaled() {
        assert!((engagement(100, 100) - 1.0).abs() < 1e-9);
        assert!(engagement(0, 100).abs() < 1e-9);
        assert!(engagement(10, 1000) > 10.0 / 1000.0);
        assert!(engagement(5, 0).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_unit_range() {
        let now = Utc::now();
        let weights = ScoringWeights::default();
        let t = terms(&["rust"]);
        let ctx = ScoreContext {
            terms: &t,
            lookback_days: 30,
            now,
            weights: &weights,
        };
        let mut results = vec![
            make("a", Source::Forum, "rust rust", 0, u64::MAX, now),
            make("b", Source::Social, "nothing", 29, 0, now),
            make("c", Source::Web, "rust", 3, 0, now),
        ];
        score_results(&mut results, &ctx);
        for r in &results {
            let s = r.score.expect("scored");
            assert!((0.0..=1.0).contains(&s), "score {s} out of range");
        }
        assert!((results[0].score.expect("scored") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn engagement_max_is_per_source() {
        let now = Utc::now();
        let weights = ScoringWeights::default();
        let ctx = ScoreContext {
            terms: &[],
            lookback_days: 30,
            now,
            weights: &weights,
        };
        let mut results = vec![
            make("forum", Source::Forum, "x", 0, 10, now),
            make("social", Source::Social, "x", 0, 10_000, now),
        ];
        score_results(&mut results, &ctx);
        assert!((results[0].score.expect("s") - results[1].score.expect("s")).abs() < 1e-9);
    }

    #[test]
    fn rank_orders_by_score_then_recency_then_id() {
        let now = Utc::now();
        let mut a = make("a", Source::Forum, "x", 2, 0, now);
        let mut b = make("b", Source::Forum, "x", 1, 0, now);
        let mut c = make("c", Source::Forum, "x", 1, 0, now);
        let mut d = make("d", Source::Forum, "x", 5, 0, now);
        a.score = Some(0.5);
        b.score = Some(0.5);
        c.score = Some(0.5);
        d.score = Some(0.9);
        let mut results = vec![a, c, b, d];
        rank(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.origin_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
