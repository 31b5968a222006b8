//! Query normalisation.
//!
//! Backends with exact-match search silently return nothing for verbose
//! topics ("best nano banana prompting practices"), so the raw topic is
//! reduced to its subject terms and then to progressively shorter candidate
//! queries. Drivers use the first candidate and fall back to the next one
//! only on an empty result.

use serde::Serialize;

/// Retries allowed after the first candidate returns nothing.
pub const MAX_QUERY_RETRIES: usize = 2;

/// Question-style openers, stripped from the start of a topic.
const PREFIXES: &[&str] = &[
    "what are the best",
    "what is the best",
    "what are people saying about",
    "what do people think of",
    "what do people think about",
    "tell me about",
    "what are the",
    "what are",
    "what is the",
    "what is",
    "what's the",
    "what's",
    "how do i",
    "how do you",
    "how does",
    "how to",
    "how can i",
    "is there",
    "are there",
    "why is",
    "why are",
    "who is",
    "which",
    "what",
    "how",
    "why",
];

/// Words that describe the kind of answer wanted rather than the subject.
const META_WORDS: &[&str] = &[
    "best",
    "top",
    "prompt",
    "prompts",
    "prompting",
    "technique",
    "techniques",
    "tips",
    "tricks",
    "practices",
    "practice",
    "features",
    "killer",
    "guide",
    "guides",
    "tutorial",
    "tutorials",
    "recommendations",
    "advice",
    "latest",
    "news",
    "using",
    "ways",
    "examples",
];

/// Filler words dropped from query terms.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "for", "with", "of", "in", "on", "to", "and", "or", "about", "my", "your",
    "is", "are", "do", "does", "i",
];

/// Candidate sizes after the full term set, largest first.
const SHORTER_SIZES: &[usize] = &[3, 2, 1];

/// Normalised query terms and fallback candidates for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    /// The topic as given.
    pub topic: String,
    /// Lowercase relevance tokens of the full normalised query.
    pub terms: Vec<String>,
    /// Candidate queries, most specific first; never empty.
    pub candidates: Vec<String>,
}

impl QueryPlan {
    /// The most specific candidate.
    pub fn primary(&self) -> &str {
        self.candidates.first().map_or(self.topic.as_str(), String::as_str)
    }

    /// The shortest candidate (the core subject).
    pub fn core(&self) -> &str {
        self.candidates.last().map_or(self.topic.as_str(), String::as_str)
    }

    /// Candidates a driver may try: the first plus at most
    /// [`MAX_QUERY_RETRIES`] shorter ones.
    pub fn attempts(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().take(1 + MAX_QUERY_RETRIES).map(String::as_str)
    }

    /// A guessed community name for the subject: the first candidate of at
    /// most three words, lowercased, with dots and spaces removed.
    ///
    /// `None` when nothing usable as a community name remains.
    pub fn community_guess(&self) -> Option<String> {
        let core = self
            .candidates
            .iter()
            .find(|c| c.split_whitespace().count() <= 3)?;
        let name: String = core
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        (!name.is_empty()).then_some(name)
    }
}

/// Build a [`QueryPlan`] from a raw topic.
///
/// # Examples
///
/// ```
/// let plan = pulse_search::query::normalize("vibe motion best prompt techniques");
/// assert_eq!(plan.candidates, vec!["vibe motion", "vibe"]);
/// ```
pub fn normalize(topic: &str) -> QueryPlan {
    let trimmed = topic.trim();
    let body = strip_prefixes(trimmed);

    let words: Vec<&str> = body
        .split_whitespace()
        .map(trim_punctuation)
        .filter(|w| !w.is_empty())
        .filter(|w| {
            let lower = w.to_lowercase();
            !META_WORDS.contains(&lower.as_str()) && !STOPWORDS.contains(&lower.as_str())
        })
        .collect();

    let candidates = if words.is_empty() {
        let fallback = trim_punctuation(trimmed);
        if fallback.is_empty() {
            Vec::new()
        } else {
            vec![fallback.to_owned()]
        }
    } else {
        let mut sizes = vec![words.len()];
        sizes.extend(SHORTER_SIZES.iter().copied().filter(|s| *s < words.len()));
        sizes.into_iter().map(|n| words[..n].join(" ")).collect()
    };

    let mut terms: Vec<String> = Vec::new();
    for token in candidates.first().map(|c| tokenize(c)).unwrap_or_default() {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }

    QueryPlan {
        topic: trimmed.to_owned(),
        terms,
        candidates,
    }
}

/// Lowercase alphanumeric tokens of a text, used for lexical relevance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Remove interrogative openers, repeatedly, on word boundaries.
fn strip_prefixes(topic: &str) -> &str {
    let mut rest = topic;
    loop {
        let matched = PREFIXES.iter().find(|p| {
            rest.get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p))
                && rest[p.len()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        });
        match matched {
            Some(p) => rest = rest[p.len()..].trim_start(),
            None => return rest,
        }
    }
}

/// Trim quotes and sentence punctuation around a word, keeping inner
/// characters such as `.` in `node.js` or `-` in `gpt-4o`.
fn trim_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '#' || c == '+'))
}
