//! Raw backend records to scoreable results.
//!
//! Applies the hard date filter: records dated before the lookback window
//! are dropped, undated records are kept at the window start with
//! `date_estimated` set, and records without text are dropped.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{Phase, RawRecord, SearchResult};

use super::origin::origin_id;

/// The lookback window of a session, in whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookbackWindow {
    /// Window length in days.
    pub days: u32,
    /// First instant inside the window (midnight UTC).
    pub from: DateTime<Utc>,
    /// Last instant inside the window.
    pub to: DateTime<Utc>,
}

impl LookbackWindow {
    /// Window of `days` days ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, days: u32) -> Self {
        let start = (now - Duration::days(i64::from(days))).date_naive();
        let from = start
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .unwrap_or(now);
        Self { days, from, to: now }
    }

    /// First day of the window.
    pub fn from_date(&self) -> NaiveDate {
        self.from.date_naive()
    }

    /// Last day of the window.
    pub fn to_date(&self) -> NaiveDate {
        self.to.date_naive()
    }

    /// Whether a timestamp lies on or after the window start.
    pub fn admits(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.from
    }
}

/// Normalise a batch of records produced by one search pass.
pub fn normalize_records(
    records: Vec<RawRecord>,
    window: &LookbackWindow,
    phase: Phase,
) -> Vec<SearchResult> {
    let before = records.len();
    let results: Vec<SearchResult> = records
        .into_iter()
        .filter_map(|record| normalize_record(record, window, phase))
        .collect();
    if results.len() < before {
        tracing::debug!(
            dropped = before - results.len(),
            kept = results.len(),
            "records outside window or without text dropped"
        );
    }
    results
}

/// Normalise one record, or `None` if it must be dropped.
pub fn normalize_record(
    record: RawRecord,
    window: &LookbackWindow,
    phase: Phase,
) -> Option<SearchResult> {
    let text = record.text.trim();
    if text.is_empty() || record.url.trim().is_empty() {
        return None;
    }

    let (timestamp, date_estimated) = match record.timestamp {
        Some(ts) if !window.admits(ts) => return None,
        Some(ts) => (ts.min(window.to), false),
        None => (window.from, true),
    };

    Some(SearchResult {
        source: record.source,
        origin_id: origin_id(record.source, &record.url),
        text: text.to_owned(),
        url: record.url,
        author: record.author,
        community: record.community,
        timestamp,
        date_estimated,
        engagement: record.engagement,
        engagement_verified: record.engagement_verified,
        score: None,
        phase,
    })
}
