// ── Engram: Retrieval Scoring ──────────────────────────────────────────────
//
// Pure scoring helpers shared by every strategy:
//   composite = base_relevance × recency × effectiveness × type_weight
// and the one total order every result list is sorted by.

use crate::atoms::engram_types::{MemoryItem, ResultSource, ScoreBreakdown, ScoredMemory};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "did", "do", "does",
    "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "me",
    "of", "on", "or", "so", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "to", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "would", "you", "your", "about", "tell", "know", "please",
];

/// Lowercase alphanumeric tokens, stopwords and 1-char tokens removed, deduplicated
/// in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2 && !STOPWORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(|w| w.to_string())
        .collect()
}

/// Fraction of query tokens present in `content`. 0.0 when the query has no tokens.
pub fn keyword_relevance(query_tokens: &[String], content: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let item_tokens: HashSet<String> = tokenize(content).into_iter().collect();
    let hits = query_tokens.iter().filter(|t| item_tokens.contains(*t)).count();
    hits as f64 / query_tokens.len() as f64
}

/// `0.5^(age_days / half_life)`, never below `floor`.
pub fn recency_factor(
    last_accessed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_days: f64,
    floor: f64,
) -> f64 {
    let age_days = (now - last_accessed_at).num_milliseconds().max(0) as f64 / 86_400_000.0;
    if half_life_days <= 0.0 {
        return floor.max(0.0).min(1.0);
    }
    0.5_f64.powf(age_days / half_life_days).max(floor).min(1.0)
}

/// Scoring inputs that do not vary per item.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext {
    pub now: DateTime<Utc>,
    pub half_life_days: f64,
    pub recency_floor: f64,
}

pub fn score_item(
    item: MemoryItem,
    base_relevance: f64,
    type_weight: f64,
    source: ResultSource,
    ctx: &ScoreContext,
) -> ScoredMemory {
    let recency = recency_factor(item.last_accessed_at, ctx.now, ctx.half_life_days, ctx.recency_floor);
    let effectiveness = item.effectiveness.clamp(0.0, 1.0) as f64;
    let composite = base_relevance * recency * effectiveness * type_weight;
    ScoredMemory {
        item,
        score: ScoreBreakdown {
            base_relevance,
            recency,
            effectiveness,
            type_weight,
            composite,
            source,
        },
    }
}

/// Composite desc, then later last_accessed_at, then earlier insertion.
pub fn rank_order(a: &ScoredMemory, b: &ScoredMemory) -> Ordering {
    b.score
        .composite
        .partial_cmp(&a.score.composite)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.item.last_accessed_at.cmp(&a.item.last_accessed_at))
        .then_with(|| a.item.created_at.cmp(&b.item.created_at))
        .then_with(|| a.item.seq.cmp(&b.item.seq))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

pub fn sort_ranked(items: &mut [ScoredMemory]) {
    items.sort_by(rank_order);
}
