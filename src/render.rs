//! Compact markdown rendering of a digest for terminal use.

use std::fmt::Write as _;

use pulse_search::digest::Digest;
use pulse_search::types::EntityKind;
use pulse_search::{SearchResult, Source, SourceStatus};

/// Below this many dated results the digest carries a sparse-data warning.
pub const SPARSE_THRESHOLD: usize = 5;

/// Longest excerpt shown per result.
const EXCERPT_CHARS: usize = 240;

/// Render a digest as compact markdown.
pub fn render_compact(digest: &Digest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", digest.topic);
    let _ = write!(
        out,
        "query `{}` | {} | {} | {} to {}",
        digest.query, digest.depth, digest.mode, digest.range.from, digest.range.to
    );
    if let Some(tool) = &digest.target_tool {
        let _ = write!(out, " | for {tool}");
    }
    out.push('\n');

    let dated = dated_results(digest);
    if dated < SPARSE_THRESHOLD {
        let _ = writeln!(
            out,
            "\n> Sparse data: only {dated} dated result{} in the last {} days.",
            if dated == 1 { "" } else { "s" },
            digest.range.days
        );
    }

    for (source, section) in &digest.sources {
        if matches!(section.status, SourceStatus::Unavailable) && section.results.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "\n## {} ({})",
            heading(*source),
            status_label(&section.status)
        );
        for (i, result) in section.results.iter().enumerate() {
            write_result(&mut out, i + 1, result);
        }
    }

    if !digest.entities.is_empty() {
        out.push_str("\n## Recurring voices\n");
        for entity in &digest.entities {
            let prefix = entity_prefix(entity.kind, entity.source);
            let _ = writeln!(
                out,
                "- {prefix}{} ({}): {} mentions, {} engagement",
                entity.identifier, entity.source, entity.mention_count, entity.aggregate_engagement
            );
        }
    }

    write_stats(&mut out, digest);

    if digest.needs_external_search {
        out.push_str("\n> Run a web search for this topic to fill the gaps.\n");
    }
    out
}

fn write_stats(out: &mut String, digest: &Digest) {
    let stats = &digest.stats;
    if stats.total_results == 0 {
        return;
    }
    out.push_str("\n## Stats\n");
    for (source, counts) in stats.sources.iter().filter(|(_, c)| c.kept > 0) {
        let counters: Vec<String> = counts
            .engagement
            .iter()
            .filter(|(_, v)| *v > 0)
            .map(|(k, v)| format!("{v} {k}"))
            .collect();
        let _ = write!(
            out,
            "- {}: {} results, {} engagement",
            heading(*source),
            counts.kept,
            counts.total_engagement
        );
        if !counters.is_empty() {
            let _ = write!(out, " ({})", counters.join(", "));
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "- Total: {} results, {} engagement",
        stats.total_results, stats.total_engagement
    );
    if !stats.most_mentioned.is_empty() {
        let names: Vec<String> = stats
            .most_mentioned
            .iter()
            .map(|e| format!("{}{} ({})", entity_prefix(e.kind, e.source), e.identifier, e.mention_count))
            .collect();
        let _ = writeln!(out, "- Most mentioned: {}", names.join(", "));
    }
}

fn entity_prefix(kind: EntityKind, source: Source) -> &'static str {
    match (kind, source) {
        (EntityKind::Community, _) => "r/",
        (EntityKind::Author, Source::Forum) => "u/",
        (EntityKind::Author, _) => "@",
    }
}

fn write_result(out: &mut String, rank: usize, result: &SearchResult) {
    let mut meta: Vec<String> = Vec::new();
    if let Some(community) = &result.community {
        meta.push(format!("r/{community}"));
    }
    if let Some(author) = &result.author {
        meta.push(match result.source {
            Source::Forum => format!("u/{author}"),
            _ => format!("@{author}"),
        });
    }
    let date = result.timestamp.format("%Y-%m-%d").to_string();
    meta.push(if result.date_estimated {
        format!("~{date}")
    } else {
        date
    });
    if !result.engagement.is_empty() {
        let counters: Vec<String> = result
            .engagement
            .iter()
            .filter(|(_, v)| *v > 0)
            .map(|(k, v)| format!("{v} {k}"))
            .collect();
        if !counters.is_empty() {
            let marker = if result.engagement_verified { "" } else { " (est.)" };
            meta.push(format!("{}{marker}", counters.join(", ")));
        }
    }

    let _ = writeln!(
        out,
        "{rank}. [{:.2}] {}",
        result.score.unwrap_or_default(),
        meta.join(" | ")
    );
    let _ = writeln!(out, "   {}", excerpt(&result.text));
    let _ = writeln!(out, "   {}", result.url);
}

fn dated_results(digest: &Digest) -> usize {
    digest
        .sources
        .values()
        .flat_map(|s| &s.results)
        .filter(|r| !r.date_estimated)
        .count()
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

fn heading(source: Source) -> &'static str {
    match source {
        Source::Forum => "Forum",
        Source::Social => "Social",
        Source::Web => "Web",
    }
}

fn status_label(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Contributed => "contributed".into(),
        SourceStatus::Empty => "no results in window".into(),
        SourceStatus::Degraded { reason } => format!("degraded: {reason}"),
        SourceStatus::Unavailable => "unavailable".into(),
    }
}
